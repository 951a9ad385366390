//! Message bodies. Anything that came from a user is HTML-escaped.

use super::OutgoingMail;

/// Names and addresses shown in every message.
#[derive(Debug, Clone)]
pub struct Branding {
    pub app_name: String,
    pub support_email: String,
    pub frontend_url: String,
}

/// Details of a request awaiting review, for the admin notification.
#[derive(Debug, Clone)]
pub struct AppealSummary<'a> {
    pub server_name: &'a str,
    pub user_email: &'a str,
    pub minecraft_name: &'a str,
    pub real_name: Option<&'a str>,
    pub reason: Option<&'a str>,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

/// Link the frontend resolves to `GET /api/auth/verify` or `/api/upgrade/verify`.
pub fn verify_url(frontend_url: &str, token: &str) -> String {
    format!("{}/verify?token={}", frontend_url.trim_end_matches('/'), token)
}

/// Magic link confirming an email address.
pub fn verification(branding: &Branding, to: &str, token: &str) -> OutgoingMail {
    let app = escape_html(&branding.app_name);
    let support = escape_html(&branding.support_email);
    let url = escape_html(&verify_url(&branding.frontend_url, token));

    OutgoingMail {
        to: vec![to.to_string()],
        subject: format!("{} - confirm your email", branding.app_name),
        html: format!(
            r#"<div style="font-family:'Segoe UI',Roboto,Helvetica,Arial,sans-serif;max-width:560px;margin:0 auto;">
  <h1 style="font-size:24px;">{app}: your magic link is ready</h1>
  <p>Confirm your email to finish joining the whitelist.</p>
  <p><a href="{url}" style="display:inline-block;padding:14px 32px;border-radius:12px;background:#111827;color:#fff;text-decoration:none;font-weight:700;">Enter the world</a></p>
  <p>Open the link on the same device and browser where you filled out the form. If the button does not work, paste this URL instead:</p>
  <p style="word-break:break-all;background:#f8fafc;padding:12px;border-radius:8px;">{url}</p>
  <p style="color:#475569;font-size:13px;">Need help? Reach us at <a href="mailto:{support}">{support}</a>. Did not request access? Ignore this email.</p>
</div>"#
        ),
    }
}

/// Six-digit one-time code.
pub fn otp_code(branding: &Branding, to: &str, code: &str, valid_minutes: i64) -> OutgoingMail {
    OutgoingMail {
        to: vec![to.to_string()],
        subject: format!("Your verification code - {}", branding.app_name),
        html: format!(
            r#"<h2>Email Verification Code</h2>
<p>Use the code below to verify your email. It expires in {valid_minutes} minutes.</p>
<p style="font-size:24px;font-weight:bold;letter-spacing:8px;">{}</p>"#,
            escape_html(code)
        ),
    }
}

/// Notice to admins that a request needs review.
pub fn appeal_notification(admins: &[String], appeal: &AppealSummary<'_>) -> OutgoingMail {
    OutgoingMail {
        to: admins.to_vec(),
        subject: format!("New whitelist request for {}", appeal.server_name),
        html: format!(
            r#"<h2>New Whitelist Request</h2>
<p><strong>Server:</strong> {}</p>
<p><strong>Email:</strong> {}</p>
<p><strong>Minecraft:</strong> {}</p>
<p><strong>Name:</strong> {}</p>
<p><strong>Reason:</strong> {}</p>"#,
            escape_html(appeal.server_name),
            escape_html(appeal.user_email),
            escape_html(appeal.minecraft_name),
            escape_html(appeal.real_name.unwrap_or("Not provided")),
            escape_html(appeal.reason.unwrap_or("No reason provided")),
        ),
    }
}
