//! ModelInfo XML reader
//!
//! Only `<modelInfo>` and the `name`/`retrievable`/`primaryCodePath`
//! attributes of `<typeInfo>` are read; element definitions are skipped.

use super::types::{ModelInfo, TypeInfo};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid ModelInfo document: {0}")]
    InvalidStructure(String),
}

/// Read a ModelInfo document
pub fn parse_xml(xml: &str) -> Result<ModelInfo, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut model: Option<ModelInfo> = None;
    loop {
        let start = match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => e,
            Event::Eof => break,
            _ => continue,
        };
        match start.local_name().as_ref() {
            b"modelInfo" => {
                let mut info = ModelInfo::default();
                for (key, value) in attributes(&start)? {
                    match key.as_str() {
                        "name" => info.name = value,
                        "version" => info.version = value,
                        _ => {}
                    }
                }
                model = Some(info);
            }
            b"typeInfo" | b"classInfo" => {
                let Some(info) = model.as_mut() else {
                    return Err(ParseError::InvalidStructure("<typeInfo> outside <modelInfo>".to_string()));
                };
                let type_info = type_info(&start)?;
                info.types.insert(type_info.name.clone(), type_info);
            }
            _ => {}
        }
    }

    model.ok_or_else(|| ParseError::InvalidStructure("missing <modelInfo> root".to_string()))
}

fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, ParseError> {
    start
        .attributes()
        .map(|attr| -> Result<(String, String), ParseError> {
            let attr = attr?;
            Ok((
                String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            ))
        })
        .collect()
}

fn type_info(start: &BytesStart<'_>) -> Result<TypeInfo, ParseError> {
    let mut info = TypeInfo::default();
    for (key, value) in attributes(start)? {
        match key.as_str() {
            "name" => info.name = value,
            "retrievable" => info.retrievable = value == "true",
            "primaryCodePath" => info.primary_code_path = Some(value),
            _ => {}
        }
    }
    if info.name.is_empty() {
        return Err(ParseError::InvalidStructure("<typeInfo> without a name".to_string()));
    }
    Ok(info)
}
