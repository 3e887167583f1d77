use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{NewAttachment, NewEmbed};

/// §4.6 attachment validation: size cap and extension allow-list, both
/// driven by configuration rather than hard-coded so an operator can widen
/// or narrow the policy without a rebuild.
pub fn validate_attachment(cfg: &Config, attachment: &NewAttachment) -> AppResult<()> {
    if attachment.size_bytes < 0 || attachment.size_bytes as u64 > cfg.max_attachment_bytes {
        return Err(AppError::InvalidInput(format!(
            "attachment {} exceeds the {} byte limit",
            attachment.filename, cfg.max_attachment_bytes
        )));
    }

    let lower = attachment.filename.to_lowercase();
    let allowed = cfg
        .attachment_allow_list
        .iter()
        .any(|ext| lower.ends_with(ext.as_str()));
    if !allowed {
        return Err(AppError::InvalidInput(format!(
            "attachment {} has a disallowed extension",
            attachment.filename
        )));
    }

    Ok(())
}

/// §4.6 embed validation: URL scheme and a required type.
pub fn validate_embed(embed: &NewEmbed) -> AppResult<()> {
    if !(embed.url.starts_with("http://") || embed.url.starts_with("https://")) {
        return Err(AppError::InvalidInput(format!(
            "embed url {} must start with http:// or https://",
            embed.url
        )));
    }
    Ok(())
}

/// §4.6 CreateMessage precondition: content, an attachment, or an embed
/// must be present — a message can never be entirely empty.
pub fn validate_message_not_empty(content: &str, attachments: &[NewAttachment], embeds: &[NewEmbed]) -> AppResult<()> {
    if content.trim().is_empty() && attachments.is_empty() && embeds.is_empty() {
        return Err(AppError::InvalidInput(
            "message must have content, an attachment, or an embed".into(),
        ));
    }
    Ok(())
}
