//! Bodies of the three emails the service sends.

use crate::{
    mailer::EmailMessage,
    subscriptions::repo_types::{NotifyWhen, Subscription},
};

const SIGNATURE: &str = "Best,\nEarnings Tracker Team";

pub fn welcome(to: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Welcome to Earnings Tracker!".into(),
        text: format!(
            "Hi there!\n\nWelcome to Earnings Tracker. You can now subscribe to earnings \
             notifications for your favorite stocks.\n\n{SIGNATURE}"
        ),
        html: Some(
            "<h1>Welcome to Earnings Tracker!</h1>\
             <p>You can now subscribe to earnings notifications for your favorite stocks.</p>"
                .into(),
        ),
    }
}

pub fn confirmation(sub: &Subscription) -> EmailMessage {
    let when = match sub.notify_when {
        NotifyWhen::DayBefore => "1 day before",
        NotifyWhen::DayOf => "on the day of",
    };
    EmailMessage {
        to: sub.email.clone(),
        subject: format!("Subscribed to {} ({}) Earnings", sub.company_name, sub.ticker),
        text: format!(
            "You will be notified {when} {} ({}) earnings on {}.",
            sub.company_name,
            sub.ticker,
            sub.earnings_date_str()
        ),
        html: None,
    }
}

pub fn reminder(sub: &Subscription) -> EmailMessage {
    let date = sub.earnings_date_str();
    let preference = sub.notify_when.label();
    EmailMessage {
        to: sub.email.clone(),
        subject: format!("Earnings Reminder: {} ({})", sub.company_name, sub.ticker),
        text: format!(
            "Hello,\n\nThis is a reminder that {} ({}) is scheduled to report earnings on \
             {date}.\n\nPreference: {preference}\n\n{SIGNATURE}",
            sub.company_name, sub.ticker
        ),
        html: Some(format!(
            r#"<div style="font-family: sans-serif; line-height: 1.5; color: #333;">
<h2>Earnings Reminder</h2>
<p>Hello,</p>
<p>This is a reminder that <strong>{name} ({ticker})</strong> is scheduled to report earnings on <strong>{date}</strong>.</p>
<p>You requested this notification for: <em>{preference}</em>.</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;" />
<p style="font-size: 0.8em; color: #888;">This is a one-time notification for this event. To manage your subscriptions, visit Earnings Tracker.</p>
</div>"#,
            name = escape_html(&sub.company_name),
            ticker = escape_html(&sub.ticker),
        )),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn reminder_names_company_and_date() {
        let sub = Subscription::new(
            "a@x.com",
            "MSFT",
            "Microsoft <Corp>",
            date!(2026 - 10 - 20),
            NotifyWhen::DayBefore,
        );
        let mail = reminder(&sub);
        assert_eq!(mail.to, "a@x.com");
        assert_eq!(mail.subject, "Earnings Reminder: Microsoft <Corp> (MSFT)");
        assert!(mail.text.contains("2026-10-20"));
        assert!(mail.text.contains("Day Before Earnings"));
        let html = mail.html.expect("reminder has html part");
        assert!(html.contains("Microsoft &lt;Corp&gt; (MSFT)"));
    }

    #[test]
    fn confirmation_describes_timing() {
        let sub = Subscription::new("a@x.com", "AAPL", "Apple", date!(2026 - 11 - 02), NotifyWhen::DayOf);
        let mail = confirmation(&sub);
        assert_eq!(mail.text, "You will be notified on the day of Apple (AAPL) earnings on 2026-11-02.");
    }
}
