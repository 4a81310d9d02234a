//! Interactive console menu.

use anyhow::Result;
use std::io::{BufRead, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    Convert,
    Train,
    Watch,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Convert),
            "2" => Some(MenuChoice::Train),
            "3" => Some(MenuChoice::Watch),
            "4" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// Actions behind the menu entries.
pub trait MenuHandler {
    fn convert(&mut self) -> Result<()>;
    fn train(&mut self) -> Result<()>;
    fn watch(&mut self) -> Result<()>;
}

const MENU: &str = "\
==== pet vision ====
1. Convert COCO dataset to YOLO labels
2. Train model
3. Start watching the camera
4. Exit
";

/// Loop until `4` or end of input. Action failures are reported and the
/// menu is shown again.
pub fn run_menu<R, W, H>(mut input: R, mut output: W, handler: &mut H) -> Result<()>
where
    R: BufRead,
    W: Write,
    H: MenuHandler + ?Sized,
{
    let mut line = String::new();
    loop {
        write!(output, "{MENU}> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }

        let outcome = match MenuChoice::parse(&line) {
            Some(MenuChoice::Convert) => handler.convert(),
            Some(MenuChoice::Train) => handler.train(),
            Some(MenuChoice::Watch) => handler.watch(),
            Some(MenuChoice::Exit) => {
                writeln!(output, "bye")?;
                return Ok(());
            }
            None => {
                writeln!(output, "invalid choice '{}', enter 1-4", line.trim())?;
                continue;
            }
        };
        if let Err(e) = outcome {
            log::error!("menu action failed: {:#}", e);
            writeln!(output, "error: {e:#}")?;
        }
    }
}
