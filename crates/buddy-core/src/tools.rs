// ABOUTME: Declared model tools and validation of the tool calls the model returns
// ABOUTME: Free-form JSON arguments become a typed ToolCall at the boundary or are rejected

use crate::error::{BuddyError, Result};
use crate::models::{ChartDescriptor, ChartKind, ChartPoint, FileFormat};
use serde::Deserialize;
use serde_json::{json, Value};

pub const CORPORATE_FILE_TOOL: &str = "generate_corporate_file";
pub const CHART_TOOL: &str = "generate_chart";
pub const INFOGRAPHIC_TOOL: &str = "generate_infographic";

/// Aspect ratios the image model accepts
pub const ASPECT_RATIOS: &[&str] = &["1:1", "16:9", "4:3", "9:16"];

/// Function declarations sent with every request in tools mode
pub fn function_declarations() -> Value {
    json!([
        {
            "name": CORPORATE_FILE_TOOL,
            "description": "Creates corporate assets (PPTX, DOCX, PDF, XLSX) from the conversation content.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "fileType": { "type": "STRING", "enum": ["pptx", "docx", "pdf", "xlsx"] },
                    "fileName": { "type": "STRING" },
                    "title": { "type": "STRING" },
                    "subtitle": { "type": "STRING" },
                    "slides": {
                        "type": "ARRAY",
                        "description": "Detailed slide content (PPTX).",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "title": { "type": "STRING" },
                                "bullets": { "type": "ARRAY", "items": { "type": "STRING" } },
                                "footer": { "type": "STRING" }
                            }
                        }
                    },
                    "sections": {
                        "type": "ARRAY",
                        "description": "Headed sections (DOCX, PDF).",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "heading": { "type": "STRING" },
                                "body": { "type": "STRING" }
                            }
                        }
                    },
                    "reportContent": { "type": "STRING", "description": "Structured body text for DOCX or PDF." },
                    "tableData": {
                        "type": "ARRAY",
                        "description": "Rows for Excel (array of arrays).",
                        "items": { "type": "ARRAY", "items": { "type": "STRING" } }
                    }
                },
                "required": ["fileType", "fileName", "title"]
            }
        },
        {
            "name": CHART_TOOL,
            "description": "Draws a bar, line or pie chart next to the answer.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "chartType": { "type": "STRING", "enum": ["bar", "line", "pie"] },
                    "title": { "type": "STRING" },
                    "data": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "label": { "type": "STRING" },
                                "value": { "type": "NUMBER" }
                            }
                        }
                    }
                },
                "required": ["chartType", "data"]
            }
        },
        {
            "name": INFOGRAPHIC_TOOL,
            "description": "Generates a visual infographic from concepts.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "prompt": { "type": "STRING" },
                    "aspectRatio": { "type": "STRING", "enum": ASPECT_RATIOS }
                },
                "required": ["prompt"]
            }
        }
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
    pub footer: Option<String>,
}

/// Chart the model suggests embedding in a generated file
#[derive(Debug, Clone, PartialEq)]
pub struct ChartHint {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Validated arguments of a file generation call
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub format: FileFormat,
    pub file_name: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub body_text: Option<String>,
    pub sections: Vec<Section>,
    pub slides: Vec<Slide>,
    pub table_rows: Vec<Vec<String>>,
    pub chart_hint: Option<ChartHint>,
}

impl FileDescriptor {
    /// Descriptor with only the required fields
    pub fn new(format: FileFormat, file_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            format,
            file_name: file_name.into(),
            title: title.into(),
            subtitle: None,
            body_text: None,
            sections: Vec::new(),
            slides: Vec::new(),
            table_rows: Vec::new(),
            chart_hint: None,
        }
    }
}

/// A tool call after validation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CorporateFile(FileDescriptor),
    Chart(ChartDescriptor),
    Infographic {
        prompt: String,
        aspect_ratio: String,
    },
    /// A name this client never declared; ignored by the controller
    Unknown(String),
}

impl ToolCall {
    /// Validate a raw call. Malformed arguments of a known tool are `InvalidToolCall`.
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        match name {
            CORPORATE_FILE_TOOL => parse_file(args).map(ToolCall::CorporateFile),
            CHART_TOOL => parse_chart(args).map(ToolCall::Chart),
            INFOGRAPHIC_TOOL => parse_infographic(args),
            other => Ok(ToolCall::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ToolCall::CorporateFile(_) => CORPORATE_FILE_TOOL,
            ToolCall::Chart(_) => CHART_TOOL,
            ToolCall::Infographic { .. } => INFOGRAPHIC_TOOL,
            ToolCall::Unknown(name) => name,
        }
    }
}

// Wire shapes. Aliases cover the argument names older prompts produce.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFileArgs {
    #[serde(alias = "fileType")]
    format: Option<String>,
    file_name: Option<String>,
    title: Option<String>,
    subtitle: Option<String>,
    #[serde(alias = "reportContent")]
    body_text: Option<String>,
    #[serde(default)]
    sections: Vec<RawSection>,
    #[serde(default)]
    slides: Vec<RawSlide>,
    #[serde(alias = "tableData")]
    table_rows: Option<Vec<Vec<Value>>>,
    chart_hint: Option<RawChartHint>,
}

#[derive(Deserialize)]
struct RawSection {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct RawSlide {
    #[serde(default)]
    title: String,
    #[serde(default)]
    bullets: Vec<String>,
    footer: Option<String>,
}

#[derive(Deserialize)]
struct RawChartHint {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChartArgs {
    #[serde(alias = "type", alias = "kind")]
    chart_type: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    data: Vec<RawPoint>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Deserialize)]
struct RawPoint {
    #[serde(alias = "name")]
    label: Value,
    value: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfographicArgs {
    prompt: Option<String>,
    aspect_ratio: Option<String>,
}

fn invalid(tool: &str, reason: impl std::fmt::Display) -> BuddyError {
    BuddyError::InvalidToolCall(format!("{}: {}", tool, reason))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Cell text of a JSON scalar
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A plain number, or a string holding one. No unit or currency parsing.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn parse_file(args: &Value) -> Result<FileDescriptor> {
    let raw: RawFileArgs = serde_json::from_value(args.clone())
        .map_err(|e| invalid(CORPORATE_FILE_TOOL, e))?;

    let tag = non_empty(raw.format).ok_or_else(|| invalid(CORPORATE_FILE_TOOL, "missing format"))?;
    let format = FileFormat::from_tag(&tag)
        .ok_or_else(|| invalid(CORPORATE_FILE_TOOL, format!("unsupported format '{}'", tag)))?;
    let title = non_empty(raw.title).unwrap_or_default();
    let file_name = non_empty(raw.file_name).unwrap_or_else(|| title.clone());

    let chart_hint = match raw.chart_hint {
        Some(hint) => {
            let kind = ChartKind::from_tag(&hint.kind).ok_or_else(|| {
                invalid(CORPORATE_FILE_TOOL, format!("unknown chart type '{}'", hint.kind))
            })?;
            let values = hint
                .values
                .iter()
                .map(|v| {
                    number(v).ok_or_else(|| {
                        invalid(CORPORATE_FILE_TOOL, format!("chart value {} is not a number", v))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(ChartHint {
                kind,
                labels: hint.labels,
                values,
            })
        }
        None => None,
    };

    Ok(FileDescriptor {
        format,
        file_name,
        title,
        subtitle: non_empty(raw.subtitle),
        body_text: raw.body_text.filter(|b| !b.trim().is_empty()),
        sections: raw
            .sections
            .into_iter()
            .map(|s| Section {
                heading: s.heading,
                body: s.body,
            })
            .collect(),
        slides: raw
            .slides
            .into_iter()
            .map(|s| Slide {
                title: s.title,
                bullets: s.bullets,
                footer: non_empty(s.footer),
            })
            .collect(),
        table_rows: raw
            .table_rows
            .unwrap_or_default()
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect(),
        chart_hint,
    })
}

fn parse_chart(args: &Value) -> Result<ChartDescriptor> {
    let raw: RawChartArgs =
        serde_json::from_value(args.clone()).map_err(|e| invalid(CHART_TOOL, e))?;

    let tag = raw.chart_type.unwrap_or_else(|| "bar".to_string());
    let kind = ChartKind::from_tag(&tag)
        .ok_or_else(|| invalid(CHART_TOOL, format!("unknown chart type '{}'", tag)))?;

    let pairs: Vec<(String, Value)> = if raw.data.is_empty() {
        if raw.labels.len() != raw.values.len() {
            return Err(invalid(
                CHART_TOOL,
                format!(
                    "{} labels but {} values",
                    raw.labels.len(),
                    raw.values.len()
                ),
            ));
        }
        raw.labels.into_iter().zip(raw.values).collect()
    } else {
        raw.data
            .into_iter()
            .map(|p| (cell_text(&p.label), p.value))
            .collect()
    };

    let points = pairs
        .into_iter()
        .map(|(label, value)| {
            number(&value)
                .map(|value| ChartPoint {
                    label: label.clone(),
                    value,
                })
                .ok_or_else(|| {
                    invalid(CHART_TOOL, format!("value {} for '{}' is not a number", value, label))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    if points.is_empty() {
        return Err(invalid(CHART_TOOL, "no data points"));
    }

    Ok(ChartDescriptor {
        kind,
        title: raw.title,
        points,
    })
}

fn parse_infographic(args: &Value) -> Result<ToolCall> {
    let raw: RawInfographicArgs =
        serde_json::from_value(args.clone()).map_err(|e| invalid(INFOGRAPHIC_TOOL, e))?;
    let prompt = non_empty(raw.prompt).ok_or_else(|| invalid(INFOGRAPHIC_TOOL, "missing prompt"))?;
    let aspect_ratio = non_empty(raw.aspect_ratio)
        .filter(|r| ASPECT_RATIOS.contains(&r.as_str()))
        .unwrap_or_else(|| "16:9".to_string());
    Ok(ToolCall::Infographic {
        prompt,
        aspect_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_name_every_tool() {
        let decls = function_declarations();
        let names: Vec<_> = decls
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec![CORPORATE_FILE_TOOL, CHART_TOOL, INFOGRAPHIC_TOOL]);
    }

    #[test]
    fn test_file_call_with_canonical_names() {
        let call = ToolCall::parse(
            CORPORATE_FILE_TOOL,
            &json!({
                "format": "xlsx",
                "fileName": "numbers",
                "title": "Numbers",
                "tableRows": [["a", "b"], ["1", "2"]]
            }),
        )
        .unwrap();
        let ToolCall::CorporateFile(file) = call else {
            panic!("Expected a file call");
        };
        assert_eq!(file.format, FileFormat::Xlsx);
        assert_eq!(file.file_name, "numbers");
        assert_eq!(file.table_rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_file_call_with_aliases_and_numeric_cells() {
        let call = ToolCall::parse(
            CORPORATE_FILE_TOOL,
            &json!({
                "fileType": "DOCX",
                "fileName": "report.docx",
                "title": "Quarterly",
                "reportContent": "Body",
                "tableData": [["year", 2024], [true, null]]
            }),
        )
        .unwrap();
        let ToolCall::CorporateFile(file) = call else {
            panic!("Expected a file call");
        };
        assert_eq!(file.format, FileFormat::Docx);
        assert_eq!(file.body_text.as_deref(), Some("Body"));
        assert_eq!(file.table_rows, vec![vec!["year", "2024"], vec!["true", ""]]);
    }

    #[test]
    fn test_file_call_slides() {
        let call = ToolCall::parse(
            CORPORATE_FILE_TOOL,
            &json!({
                "fileType": "pptx",
                "fileName": "deck",
                "title": "Deck",
                "slides": [{"title": "One", "bullets": ["x", "y"], "footer": " "}]
            }),
        )
        .unwrap();
        let ToolCall::CorporateFile(file) = call else {
            panic!("Expected a file call");
        };
        assert_eq!(
            file.slides,
            vec![Slide {
                title: "One".into(),
                bullets: vec!["x".into(), "y".into()],
                footer: None,
            }]
        );
    }

    #[test]
    fn test_file_call_rejects_bad_format() {
        let err = ToolCall::parse(
            CORPORATE_FILE_TOOL,
            &json!({"fileType": "odt", "fileName": "x", "title": "x"}),
        )
        .unwrap_err();
        assert!(matches!(err, BuddyError::InvalidToolCall(msg) if msg.contains("odt")));

        let err = ToolCall::parse(CORPORATE_FILE_TOOL, &json!({"title": "x"})).unwrap_err();
        assert!(matches!(err, BuddyError::InvalidToolCall(_)));
    }

    #[test]
    fn test_file_name_falls_back_to_title() {
        let ToolCall::CorporateFile(file) = ToolCall::parse(
            CORPORATE_FILE_TOOL,
            &json!({"format": "pdf", "title": "Summary"}),
        )
        .unwrap() else {
            panic!("Expected a file call");
        };
        assert_eq!(file.file_name, "Summary");
    }

    #[test]
    fn test_chart_from_points_and_numeric_strings() {
        let call = ToolCall::parse(
            CHART_TOOL,
            &json!({
                "chartType": "pie",
                "title": "Share",
                "data": [{"label": "A", "value": 3}, {"label": "B", "value": "4.5"}]
            }),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::Chart(ChartDescriptor {
                kind: ChartKind::Pie,
                title: "Share".into(),
                points: vec![
                    ChartPoint {
                        label: "A".into(),
                        value: 3.0
                    },
                    ChartPoint {
                        label: "B".into(),
                        value: 4.5
                    },
                ],
            })
        );
    }

    #[test]
    fn test_chart_from_parallel_arrays() {
        let ToolCall::Chart(chart) = ToolCall::parse(
            CHART_TOOL,
            &json!({"type": "line", "labels": ["q1", "q2"], "values": [1, 2]}),
        )
        .unwrap() else {
            panic!("Expected a chart");
        };
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.points.len(), 2);
    }

    #[test]
    fn test_chart_rejects_units_and_empty_data() {
        let err = ToolCall::parse(
            CHART_TOOL,
            &json!({"chartType": "bar", "data": [{"label": "A", "value": "12€"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, BuddyError::InvalidToolCall(_)));

        let err = ToolCall::parse(CHART_TOOL, &json!({"chartType": "bar", "data": []})).unwrap_err();
        assert!(matches!(err, BuddyError::InvalidToolCall(msg) if msg.contains("no data")));

        let err = ToolCall::parse(
            CHART_TOOL,
            &json!({"labels": ["a", "b"], "values": [1]}),
        )
        .unwrap_err();
        assert!(matches!(err, BuddyError::InvalidToolCall(_)));
    }

    #[test]
    fn test_infographic_defaults_aspect_ratio() {
        let call = ToolCall::parse(
            INFOGRAPHIC_TOOL,
            &json!({"prompt": "growth funnel", "aspectRatio": "2:1"}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::Infographic {
                prompt: "growth funnel".into(),
                aspect_ratio: "16:9".into()
            }
        );
        assert!(ToolCall::parse(INFOGRAPHIC_TOOL, &json!({})).is_err());
    }

    #[test]
    fn test_unknown_tool_is_not_an_error() {
        let call = ToolCall::parse("launch_rocket", &json!({"x": 1})).unwrap();
        assert_eq!(call, ToolCall::Unknown("launch_rocket".into()));
        assert_eq!(call.name(), "launch_rocket");
    }
}
