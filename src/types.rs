#[derive(Debug, PartialEq, Eq)]
pub struct Command<'a> {
	pub arguments: Vec<&'a [u8]>,
	pub input: Option<&'a [u8]>,
	pub output: Option<&'a [u8]>,
}

impl<'a> Command<'a> {
	pub fn new() -> Command<'a> {
		Command { arguments: vec![], input: None, output: None }
	}

	pub fn name(&self) -> &'a [u8] {
		self.arguments[0]
	}
}

#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline<'a> {
	pub commands: Vec<Command<'a>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
	Empty,
	Exit,
	Pipeline(Pipeline<'a>),
}
