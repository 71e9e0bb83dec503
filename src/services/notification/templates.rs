//! Invitation email templates.

use super::InvitationEmail;

/// Rendered subject and bodies of an invitation email
pub struct InvitationEmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl InvitationEmailContent {
    pub fn new(email: &InvitationEmail) -> Self {
        let subject = match &email.company_name {
            Some(company) => format!("You're invited to join {} on Trainhub", company),
            None => "You're invited to join Trainhub".to_string(),
        };

        Self {
            subject,
            text: Self::text_template(email),
            html: Self::html_template(email),
        }
    }

    fn text_template(email: &InvitationEmail) -> String {
        let company_line = email
            .company_name
            .as_ref()
            .map(|c| format!(" at {}", c))
            .unwrap_or_default();

        format!(
            r#"Hello {name},

{inviter} has invited you to join Trainhub as a {role}{company}.

Accept your invitation here:
{url}

This invitation expires in {days} days.

If you weren't expecting this invitation, you can ignore this email.

--
Trainhub"#,
            name = email.recipient_name,
            inviter = email.inviter_name,
            role = email.role_label,
            company = company_line,
            url = email.accept_url,
            days = email.expires_in_days,
        )
    }

    fn html_template(email: &InvitationEmail) -> String {
        let company_line = email
            .company_name
            .as_ref()
            .map(|c| format!(" at <strong>{}</strong>", escape_html(c)))
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background: #f5f5f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #1a1a1a; margin-top: 0; font-size: 24px; }}
        .button {{ display: inline-block; padding: 12px 24px; background: #2563eb; color: white; text-decoration: none; border-radius: 6px; font-weight: 600; }}
        .expires {{ color: #666; font-size: 14px; }}
        .footer {{ margin-top: 32px; padding-top: 20px; border-top: 1px solid #eee; color: #888; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <h1>Hello {name},</h1>
            <p>{inviter} has invited you to join Trainhub as a <strong>{role}</strong>{company}.</p>
            <p><a class="button" href="{url}">Accept invitation</a></p>
            <p class="expires">This invitation expires in {days} days.</p>
            <div class="footer">
                <p>If the button doesn't work, paste this link into your browser:<br>{url}</p>
                <p>If you weren't expecting this invitation, you can ignore this email.</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
            name = escape_html(&email.recipient_name),
            inviter = escape_html(&email.inviter_name),
            role = escape_html(&email.role_label),
            company = company_line,
            url = escape_html(&email.accept_url),
            days = email.expires_in_days,
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
