//! 协作者输出解析：按 XML 风格标签抽取字段，去除 Markdown 代码围栏

use std::sync::OnceLock;

use regex::Regex;

use crate::core::CollaboratorError;

/// 抽取 `<tag>...</tag>` 之间的内容
///
/// 缺少开标签视为生成失败；缺少闭标签时取开标签之后的全部内容（模型常在长输出末尾截断）。
pub fn parse_tag(tag: &str, text: &str) -> Result<String, CollaboratorError> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = text
        .find(&open)
        .ok_or_else(|| CollaboratorError::MissingField(tag.to_string()))?
        + open.len();

    match text[start..].find(&close) {
        Some(end) => Ok(text[start..start + end].to_string()),
        None => {
            tracing::debug!(tag, "closing tag not found, using rest of output");
            Ok(text[start..].to_string())
        }
    }
}

/// 去除 ``` / ```python 等代码围栏
pub fn clean_code(code: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+\-]*").expect("valid fence regex"));
    fence.replace_all(code, "").into_owned()
}
