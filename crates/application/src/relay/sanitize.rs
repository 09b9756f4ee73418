use domain::{DomainError, MessageContent};

/// 校验并转义用户输入的消息正文，转义后的文本才会入库和广播。
///
/// 长度限制作用于转义前的文本。
pub fn sanitize_content(raw: &str, max_chars: usize) -> Result<MessageContent, DomainError> {
    let checked = MessageContent::new(raw.trim(), max_chars)?;
    let escaped = html_escape::encode_text(checked.as_str()).into_owned();
    MessageContent::new(escaped, usize::MAX)
}
