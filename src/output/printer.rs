//! Print sink rendering extracted rows through a template

use crate::config::OutputConfig;
use crate::output::template::{Template, TemplateData};
use crate::output::traits::PrintSink;
use crate::state::PageInfo;
use crate::{ConfigError, SinkError};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Writes one rendered line per print row
///
/// A write failure (for example a closed pipe) is fatal for the run.
pub struct Printer<W: Write + Send> {
    template: Template,
    out: Mutex<W>,
}

impl Printer<io::Stdout> {
    pub fn stdout(template: Template) -> Self {
        Self::new(template, io::stdout())
    }

    pub fn from_config(config: &OutputConfig) -> Result<Self, ConfigError> {
        Ok(Self::stdout(Template::parse_print(&config.print_format)?))
    }
}

impl<W: Write + Send> Printer<W> {
    pub fn new(template: Template, out: W) -> Self {
        Self {
            template,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> PrintSink for Printer<W> {
    fn print(&self, info: &PageInfo, rows: &[Vec<String>]) -> Result<(), SinkError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let fatal = |e: io::Error| SinkError::Fatal(format!("failed to write output: {}", e));

        for row in rows {
            let line = self.template.render(&TemplateData::for_page(info, row));
            writeln!(out, "{}", line).map_err(fatal)?;
        }
        out.flush().map_err(fatal)
    }
}
