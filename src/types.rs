use std::path::PathBuf;

/// Upper bound on the number of stages in one pipeline.
pub const MAX_SEGMENTS: usize = 64;

/// How a segment receives input from the stage before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    None,
    Pipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRedirect {
    pub path: PathBuf,
    pub mode: RedirectMode,
}

/// One external command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub args: Vec<String>,
    pub link: Link,
    pub redirect_in: Option<PathBuf>,
    pub redirect_out: Option<OutputRedirect>,
}

impl Segment {
    pub fn new(link: Link) -> Self {
        Segment { args: Vec::new(), link, redirect_in: None, redirect_out: None }
    }

    pub fn program(&self) -> Option<&str> { self.args.first().map(String::as_str) }
    pub fn is_blank(&self) -> bool { self.args.is_empty() }
}

/// A compiled line. Never empty: a blank line is one segment with no arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    segments: Vec<Segment>,
}

impl Pipeline {
    /// Only the compiler builds pipelines, and it never hands over an empty list.
    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        debug_assert!(!segments.is_empty() && segments.len() <= MAX_SEGMENTS);
        Pipeline { segments }
    }

    pub fn segments(&self) -> &[Segment] { &self.segments }
    pub fn len(&self) -> usize { self.segments.len() }
    pub fn first(&self) -> &Segment { &self.segments[0] }
    pub fn is_blank(&self) -> bool { self.segments.len() == 1 && self.segments[0].is_blank() }
}

pub type BuiltinFunction = fn(&[String]) -> Result<(), crate::error::RshError>;
