//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Engine command model, text rendering and command sinks."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
//! Commands are built as typed values and only turned into text at the sink,
//! so attribute formatting lives in one place.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::Result;
use crate::phase::BusRef;

/// Element classes the compiler creates or edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementClass {
    Circuit,
    Vsource,
    Transformer,
    Linecode,
    Line,
    Capacitor,
    Reactor,
    RegControl,
    Load,
    Loadshape,
}

impl ElementClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementClass::Circuit => "circuit",
            ElementClass::Vsource => "vsource",
            ElementClass::Transformer => "transformer",
            ElementClass::Linecode => "linecode",
            ElementClass::Line => "line",
            ElementClass::Capacitor => "capacitor",
            ElementClass::Reactor => "reactor",
            ElementClass::RegControl => "regcontrol",
            ElementClass::Load => "load",
            ElementClass::Loadshape => "loadshape",
        }
    }
}

impl fmt::Display for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute value. Lists render as `[a, b, c]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Number(number) => write!(f, "{}", number),
            Value::Integer(number) => write!(f, "{}", number),
            Value::Bool(flag) => write!(f, "{}", flag),
            Value::List(items) => {
                f.write_str("[")?;
                for (position, item) in items.iter().enumerate() {
                    if position > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&BusRef> for Value {
    fn from(value: &BusRef) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<BusRef> for Value {
    fn from(value: BusRef) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// A single `key=value` pair. Keys may repeat (`wdg=1 ... wdg=2 ...`).
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: &'static str,
    pub value: Value,
}

/// Named element plus its ordered attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    class: ElementClass,
    name: String,
    attrs: Vec<Attr>,
}

impl Element {
    pub fn new(class: ElementClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.attrs.push(Attr {
            key,
            value: value.into(),
        });
        self
    }

    pub fn push(&mut self, key: &'static str, value: impl Into<Value>) {
        self.attrs.push(Attr {
            key,
            value: value.into(),
        });
    }

    pub fn class(&self) -> ElementClass {
        self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    /// Last value written for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .rev()
            .find(|attr| attr.key == key)
            .map(|attr| &attr.value)
    }

    pub fn into_new(self) -> DssCommand {
        DssCommand::New(self)
    }

    pub fn into_edit(self) -> DssCommand {
        DssCommand::Edit(self)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)?;
        for attr in &self.attrs {
            write!(f, " {}={}", attr.key, attr.value)?;
        }
        Ok(())
    }
}

/// One line of the engine script.
#[derive(Debug, Clone, PartialEq)]
pub enum DssCommand {
    Clear,
    Set { option: &'static str, value: Value },
    New(Element),
    Edit(Element),
    CalcVoltageBases,
}

impl DssCommand {
    pub fn set(option: &'static str, value: impl Into<Value>) -> Self {
        DssCommand::Set {
            option,
            value: value.into(),
        }
    }

    /// The element created or edited by this command, if any.
    pub fn element(&self) -> Option<&Element> {
        match self {
            DssCommand::New(element) | DssCommand::Edit(element) => Some(element),
            _ => None,
        }
    }

    pub fn creates(&self, class: ElementClass) -> bool {
        matches!(self, DssCommand::New(element) if element.class == class)
    }
}

impl fmt::Display for DssCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DssCommand::Clear => f.write_str("clear"),
            DssCommand::Set { option, value } => write!(f, "set {}={}", option, value),
            DssCommand::New(element) => write!(f, "new {}", element),
            DssCommand::Edit(element) => write!(f, "edit {}", element),
            DssCommand::CalcVoltageBases => f.write_str("calcv"),
        }
    }
}

/// Destination of the ordered command stream.
pub trait CommandSink {
    fn submit(&mut self, command: DssCommand) -> Result<()>;
}

/// Sink that keeps every command in memory, in submission order.
#[derive(Debug, Clone, Default)]
pub struct CommandScript {
    commands: Vec<DssCommand>,
}

impl CommandScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DssCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands.iter().map(ToString::to_string).collect()
    }

    /// Full script text, one command per line.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for command in &self.commands {
            text.push_str(&command.to_string());
            text.push('\n');
        }
        text
    }

    /// Submit every held command, in order, to another sink.
    pub fn replay<K: CommandSink + ?Sized>(&self, sink: &mut K) -> Result<()> {
        for command in &self.commands {
            sink.submit(command.clone())?;
        }
        Ok(())
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.render())?;
        Ok(())
    }
}

impl CommandSink for CommandScript {
    fn submit(&mut self, command: DssCommand) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }
}

/// Sink that streams rendered commands straight into a writer.
pub struct WriterSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CommandSink for WriterSink<W> {
    fn submit(&mut self, command: DssCommand) -> Result<()> {
        writeln!(self.writer, "{}", command)?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_element_with_list_attributes() {
        let bus = BusRef::with_suffix("mv_f0_n4", "1.3").unwrap();
        let command = Element::new(ElementClass::Transformer, "tx1")
            .attr("phases", 1u8)
            .attr("buses", vec![Value::from(&bus), Value::from("lv.1")])
            .attr("kvs", vec![12.7, 0.25])
            .into_new();
        assert_eq!(
            command.to_string(),
            "new transformer.tx1 phases=1 buses=[mv_f0_n4.1.3, lv.1] kvs=[12.7, 0.25]"
        );
    }

    #[test]
    fn renders_directives() {
        assert_eq!(DssCommand::Clear.to_string(), "clear");
        assert_eq!(
            DssCommand::set("DefaultBaseFrequency", 50.0).to_string(),
            "set DefaultBaseFrequency=50"
        );
        assert_eq!(DssCommand::CalcVoltageBases.to_string(), "calcv");
        let edit = Element::new(ElementClass::Load, "c1")
            .attr("daily", "Load_shape_res_0")
            .into_edit();
        assert_eq!(edit.to_string(), "edit load.c1 daily=Load_shape_res_0");
    }

    #[test]
    fn repeated_keys_keep_order_and_get_returns_last() {
        let element = Element::new(ElementClass::Transformer, "reg")
            .attr("wdg", 1u8)
            .attr("kv", 12.7)
            .attr("wdg", 2u8)
            .attr("kv", 1.27);
        assert_eq!(element.attrs().len(), 4);
        assert_eq!(element.get("kv"), Some(&Value::Number(1.27)));
        assert_eq!(element.to_string(), "transformer.reg wdg=1 kv=12.7 wdg=2 kv=1.27");
    }

    #[test]
    fn replay_streams_rendered_lines_into_writer() {
        let mut script = CommandScript::new();
        script.submit(DssCommand::Clear).unwrap();
        script.submit(DssCommand::set("maxcontroliter", 100u32)).unwrap();
        let mut sink = WriterSink::new(Vec::new());
        script.replay(&mut sink).unwrap();
        assert_eq!(sink.written(), 2);
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "clear\nset maxcontroliter=100\n"
        );
    }

    #[test]
    fn script_writes_one_line_per_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut script = CommandScript::new();
        script.submit(DssCommand::Clear).unwrap();
        script.submit(DssCommand::CalcVoltageBases).unwrap();
        let path = dir.path().join("out/circuit.dss");
        script.write_to(&path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "clear\ncalcv\n");
        assert!(script.commands()[0].element().is_none());
    }

    #[test]
    fn writer_sink_streams_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.submit(DssCommand::set("maxcontroliter", 100u32)).unwrap();
        assert_eq!(sink.written(), 1);
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "set maxcontroliter=100\n"
        );
    }
}
