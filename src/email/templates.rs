//! Built-in email templates.
//!
//! Templates receive values that are already HTML-escaped; liquid does not
//! escape on its own, so callers must never pass raw user input.

use std::collections::HashMap;

use super::EmailError;

pub const CONTACT_NOTIFICATION: &str = "contact_notification";
pub const CONTACT_CONFIRMATION: &str = "contact_confirmation";
pub const BOOKING_NOTIFICATION: &str = "booking_notification";
pub const BOOKING_CONFIRMATION: &str = "booking_confirmation";
pub const PRICING_NOTIFICATION: &str = "pricing_notification";
pub const PRICING_CONFIRMATION: &str = "pricing_confirmation";
pub const PASSWORD_RESET: &str = "password_reset";

const LAYOUT_START: &str = r#"<html>
<body style="font-family: Arial, sans-serif; color: #1f2937; line-height: 1.6;">
<div style="max-width: 600px; margin: 0 auto; padding: 24px;">
"#;

const LAYOUT_END: &str = r#"
</div>
</body>
</html>"#;

const CONTACT_NOTIFICATION_BODY: &str = r#"<h2>New contact form submission</h2>
<p><strong>Name:</strong> {{ name }}</p>
<p><strong>Email:</strong> {{ email }}</p>
{% if phone != "" %}<p><strong>Phone:</strong> {{ phone }}</p>{% endif %}
{% if company != "" %}<p><strong>Company:</strong> {{ company }}</p>{% endif %}
<p><strong>Subject:</strong> {{ subject }}</p>
<p><strong>Message:</strong></p>
{{ message }}"#;

const CONTACT_CONFIRMATION_BODY: &str = r#"<h2>Thank you for contacting {{ company_name }}</h2>
<p>Dear {{ name }},</p>
{% if reply != "" %}{{ reply }}{% else %}<p>We have received your message and will get back to you within 24-48 hours.</p>
<p><strong>Your message:</strong></p>
<p><em>{{ subject }}</em></p>
{{ message }}{% endif %}
<p>Best regards,<br>The {{ company_name }} Team</p>"#;

const BOOKING_NOTIFICATION_BODY: &str = r#"<h2>New booking request</h2>
<p><strong>Name:</strong> {{ name }}</p>
<p><strong>Email:</strong> {{ email }}</p>
{% if phone != "" %}<p><strong>Phone:</strong> {{ phone }}</p>{% endif %}
{% if company != "" %}<p><strong>Company:</strong> {{ company }}</p>{% endif %}
<p><strong>Service:</strong> {{ service }}</p>
{% if preferred_date != "" %}<p><strong>Preferred date:</strong> {{ preferred_date }}</p>{% endif %}
{% if message != "" %}<p><strong>Notes:</strong></p>
{{ message }}{% endif %}"#;

const BOOKING_CONFIRMATION_BODY: &str = r#"<h2>Your booking request with {{ company_name }}</h2>
<p>Dear {{ name }},</p>
{% if reply != "" %}{{ reply }}{% else %}<p>Thank you for booking a consultation for <strong>{{ service }}</strong>.</p>
{% if preferred_date != "" %}<p>We noted your preferred date: {{ preferred_date }}. Our team will confirm the exact time shortly.</p>{% else %}<p>Our team will reach out shortly to schedule a time.</p>{% endif %}
{% if message != "" %}<p><strong>Your notes:</strong></p>
{{ message }}{% endif %}{% endif %}
<p>Best regards,<br>The {{ company_name }} Team</p>"#;

const PRICING_NOTIFICATION_BODY: &str = r#"<h2>New pricing request</h2>
<p><strong>Name:</strong> {{ name }}</p>
<p><strong>Email:</strong> {{ email }}</p>
{% if company != "" %}<p><strong>Company:</strong> {{ company }}</p>{% endif %}
<p><strong>Plan:</strong> {{ plan }}</p>
{% if message != "" %}<p><strong>Requirements:</strong></p>
{{ message }}{% endif %}"#;

const PRICING_CONFIRMATION_BODY: &str = r#"<h2>Your pricing request</h2>
<p>Dear {{ name }},</p>
<p>Thank you for your interest in the <strong>{{ plan }}</strong> plan. A member of our team will send you a tailored quote shortly.</p>
{% if message != "" %}<p><strong>Your requirements:</strong></p>
{{ message }}{% endif %}
<p>Best regards,<br>The {{ company_name }} Team</p>"#;

const PASSWORD_RESET_BODY: &str = r#"<h2>Password reset</h2>
<p>Use the code below to reset your {{ company_name }} admin password:</p>
<p style="font-size: 28px; font-weight: bold; letter-spacing: 6px;">{{ code }}</p>
<p>This code expires in {{ minutes }} minutes. If you did not request a reset, you can ignore this email.</p>"#;

const TEMPLATES: [(&str, &str); 7] = [
    (CONTACT_NOTIFICATION, CONTACT_NOTIFICATION_BODY),
    (CONTACT_CONFIRMATION, CONTACT_CONFIRMATION_BODY),
    (BOOKING_NOTIFICATION, BOOKING_NOTIFICATION_BODY),
    (BOOKING_CONFIRMATION, BOOKING_CONFIRMATION_BODY),
    (PRICING_NOTIFICATION, PRICING_NOTIFICATION_BODY),
    (PRICING_CONFIRMATION, PRICING_CONFIRMATION_BODY),
    (PASSWORD_RESET, PASSWORD_RESET_BODY),
];

pub struct EmailTemplates {
    templates: HashMap<&'static str, liquid::Template>,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, EmailError> {
        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| EmailError::TemplateError(format!("Failed to create parser: {}", e)))?;

        let mut templates = HashMap::new();
        for (name, body) in TEMPLATES {
            let source = format!("{}{}{}", LAYOUT_START, body, LAYOUT_END);
            let template = parser.parse(&source).map_err(|e| {
                EmailError::TemplateError(format!("Failed to parse template {}: {}", name, e))
            })?;
            templates.insert(name, template);
        }

        Ok(Self { templates })
    }

    pub fn render(&self, name: &str, globals: &liquid::Object) -> Result<String, EmailError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| EmailError::TemplateError(format!("Unknown template: {}", name)))?;

        template
            .render(globals)
            .map_err(|e| EmailError::TemplateError(format!("Failed to render {}: {}", name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_parse() {
        let templates = EmailTemplates::new().unwrap();
        assert_eq!(templates.templates.len(), TEMPLATES.len());
    }

    #[test]
    fn test_confirmation_uses_static_text_without_reply() {
        let templates = EmailTemplates::new().unwrap();
        let globals = liquid::object!({
            "company_name": "VyomAi",
            "name": "Ada",
            "subject": "Hi",
            "message": "<p>Hello</p>",
            "reply": "",
        });

        let html = templates.render(CONTACT_CONFIRMATION, &globals).unwrap();
        assert!(html.contains("Dear Ada,"));
        assert!(html.contains("within 24-48 hours"));
        assert!(html.contains("<p>Hello</p>"));
        assert!(html.contains("The VyomAi Team"));
    }

    #[test]
    fn test_confirmation_prefers_generated_reply() {
        let templates = EmailTemplates::new().unwrap();
        let globals = liquid::object!({
            "company_name": "VyomAi",
            "name": "Ada",
            "subject": "Hi",
            "message": "<p>Hello</p>",
            "reply": "<p>Generated reply</p>",
        });

        let html = templates.render(CONTACT_CONFIRMATION, &globals).unwrap();
        assert!(html.contains("<p>Generated reply</p>"));
        assert!(!html.contains("within 24-48 hours"));
        assert!(html.contains("Dear Ada,"));
    }

    #[test]
    fn test_optional_fields_are_omitted_when_blank() {
        let templates = EmailTemplates::new().unwrap();
        let globals = liquid::object!({
            "name": "Ada",
            "email": "ada@example.com",
            "phone": "",
            "company": "",
            "subject": "Hi",
            "message": "<p>Hello</p>",
        });

        let html = templates.render(CONTACT_NOTIFICATION, &globals).unwrap();
        assert!(!html.contains("Phone:"));
        assert!(!html.contains("Company:"));
        assert!(html.contains("ada@example.com"));
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let templates = EmailTemplates::new().unwrap();
        let result = templates.render("missing", &liquid::object!({}));
        assert!(matches!(result, Err(EmailError::TemplateError(_))));
    }
}
