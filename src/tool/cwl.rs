//! Rendering of a tool as a CWL v1.0 `CommandLineTool` document

use serde::Serialize;
use std::path::Path;

use super::model::{CommandLineTool, Parameter, ParameterRole, Stream};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CwlDocument {
    cwl_version: &'static str,
    class: &'static str,
    base_command: Vec<String>,
    inputs: Vec<CwlInput>,
    outputs: Vec<CwlOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CwlInput {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    default: CwlDefault,
    input_binding: CwlBinding,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum CwlDefault {
    File { class: &'static str, path: String },
    Text(String),
    Switch(bool),
}

#[derive(Debug, Serialize)]
struct CwlBinding {
    position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    separate: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CwlOutput {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_binding: Option<CwlGlob>,
}

#[derive(Debug, Serialize)]
struct CwlGlob {
    glob: String,
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl CommandLineTool {
    /// Render the tool as YAML.
    ///
    /// Every parameter binds at its index in the command line so that CWL
    /// reproduces the original token order, flags included.
    pub fn to_cwl(&self) -> Result<String, serde_yaml::Error> {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        for (index, parameter) in self.parameters.iter().enumerate() {
            let id = format!("input_{}", index + 1);
            let input = cwl_input(&id, index + 1, parameter);

            if parameter.role() == ParameterRole::OutputPath {
                outputs.push(CwlOutput {
                    id: format!("output_{}", outputs.len() + 1),
                    kind: "File",
                    output_binding: Some(CwlGlob {
                        glob: format!("$(inputs.{id})"),
                    }),
                });
            }
            inputs.push(input);
        }

        let stream_target = |stream| self.redirection(stream).map(|r| path_string(&r.target));
        for stream in [Stream::Stdout, Stream::Stderr] {
            if self.redirection(stream).is_some() {
                outputs.push(CwlOutput {
                    id: format!("output_{}", outputs.len() + 1),
                    kind: if stream == Stream::Stdout { "stdout" } else { "stderr" },
                    output_binding: None,
                });
            }
        }

        let bound: Vec<&Path> = self
            .parameters_with_role(ParameterRole::OutputPath)
            .filter_map(|p| p.path.as_deref())
            .chain(self.redirections.iter().map(|r| r.target.as_path()))
            .collect();
        for path in self.outputs.iter().filter(|p| !bound.contains(&p.as_path())) {
            outputs.push(CwlOutput {
                id: format!("output_{}", outputs.len() + 1),
                kind: "File",
                output_binding: Some(CwlGlob {
                    glob: path_string(path),
                }),
            });
        }

        let document = CwlDocument {
            cwl_version: "v1.0",
            class: "CommandLineTool",
            base_command: self.base_command.clone(),
            inputs,
            outputs,
            stdin: stream_target(Stream::Stdin),
            stdout: stream_target(Stream::Stdout),
            stderr: stream_target(Stream::Stderr),
        };
        serde_yaml::to_string(&document)
    }
}

fn cwl_input(id: &str, position: usize, parameter: &Parameter) -> CwlInput {
    let (kind, default) = match parameter.role() {
        ParameterRole::InputPath => (
            "File",
            CwlDefault::File {
                class: "File",
                path: parameter.value.clone(),
            },
        ),
        ParameterRole::Flag => ("boolean", CwlDefault::Switch(true)),
        ParameterRole::Literal | ParameterRole::OutputPath | ParameterRole::FlagWithValue => {
            ("string", CwlDefault::Text(parameter.value.clone()))
        }
    };

    let prefix = match parameter.role() {
        ParameterRole::Flag => Some(parameter.value.clone()),
        _ => parameter.prefix.clone(),
    };
    let separate = parameter.prefix.as_ref().map(|_| false);

    CwlInput {
        id: id.to_string(),
        kind,
        default,
        input_binding: CwlBinding {
            position,
            prefix,
            separate,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::model::{Classification, Redirection};
    use std::path::PathBuf;

    fn parameter(prefix: Option<&str>, value: &str, role: ParameterRole, path: Option<&str>) -> Parameter {
        Parameter {
            position: None,
            prefix: prefix.map(str::to_string),
            value: value.to_string(),
            classification: Classification::Final(role),
            path: path.map(PathBuf::from),
        }
    }

    #[test]
    fn test_cwl_document_shape() {
        let tool = CommandLineTool {
            command: vec![
                "sort".into(),
                "-r".into(),
                "--output=sorted.txt".into(),
                "a.txt".into(),
            ],
            base_command: vec!["sort".into()],
            parameters: vec![
                parameter(None, "-r", ParameterRole::Flag, None),
                parameter(
                    Some("--output="),
                    "sorted.txt",
                    ParameterRole::OutputPath,
                    Some("sorted.txt"),
                ),
                parameter(None, "a.txt", ParameterRole::InputPath, Some("a.txt")),
            ],
            redirections: vec![Redirection {
                stream: Stream::Stderr,
                target: PathBuf::from("sort.log"),
            }],
            inputs: vec![PathBuf::from("a.txt")],
            outputs: vec![
                PathBuf::from("sorted.txt"),
                PathBuf::from("sort.log"),
                PathBuf::from("stats.json"),
            ],
        };

        let yaml = tool.to_cwl().unwrap();
        let document: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(document["cwlVersion"], "v1.0");
        assert_eq!(document["baseCommand"][0], "sort");
        assert_eq!(document["stderr"], "sort.log");
        assert!(document.get("stdout").is_none());

        let inputs = document["inputs"].as_sequence().unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0]["type"], "boolean");
        assert_eq!(inputs[0]["inputBinding"]["prefix"], "-r");
        assert_eq!(inputs[1]["inputBinding"]["prefix"], "--output=");
        assert_eq!(inputs[1]["inputBinding"]["separate"], false);
        assert_eq!(inputs[2]["default"]["class"], "File");
        assert_eq!(inputs[2]["inputBinding"]["position"], 3);

        let outputs = document["outputs"].as_sequence().unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0]["outputBinding"]["glob"], "$(inputs.input_2)");
        assert_eq!(outputs[1]["type"], "stderr");
        assert_eq!(outputs[2]["outputBinding"]["glob"], "stats.json");
    }
}
