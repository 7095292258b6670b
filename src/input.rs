use std::{
    fmt,
    io::{
        BufRead,
        Write,
    },
    path::{
        PathBuf,
    },
};

use crate::{
    Error,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputField {
    VideoId,
    ImagePath,
}

impl InputField {
    pub fn prompt(self) -> &'static str {
        match self {
            Self::VideoId => "Please enter a video Id to update: ",
            Self::ImagePath => "Please enter the path of the image file to upload: ",
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            Self::VideoId => "Video Id can't be empty!",
            Self::ImagePath => "Path can not be empty!",
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoId => f.write_str("video id"),
            Self::ImagePath => f.write_str("image path"),
        }
    }
}

/// Asks for one line at a time on `output` and reads the answer from `input`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R, W> Prompter<R, W>
    where
        R: BufRead,
        W: Write,
{
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    pub fn read_video_id(&mut self) -> Result<String, Error> {
        self.read_field(InputField::VideoId)
    }

    pub fn read_image_path(&mut self) -> Result<PathBuf, Error> {
        self.read_field(InputField::ImagePath).map(PathBuf::from)
    }

    /// Only the line terminator is stripped; blank answers (including end of input) are rejected.
    pub fn read_field(&mut self, field: InputField) -> Result<String, Error> {
        write!(self.output, "{}", field.prompt())?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let value = strip_line_ending(&line);
        if value.trim().is_empty() {
            return Err(Error::EmptyInput(field));
        };
        Ok(value.into())
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn new_prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn read_values() {
        let mut prompter = new_prompter("abc123\r\n  some dir/thumb.png \n");
        assert_eq!(prompter.read_video_id().unwrap(), "abc123");
        assert_eq!(prompter.read_image_path().unwrap(), PathBuf::from("  some dir/thumb.png "));

        let (_, output) = prompter.into_inner();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Please enter a video Id to update: Please enter the path of the image file to upload: ",
        );
    }

    #[test]
    fn last_line_without_newline() {
        let mut prompter = new_prompter("abc123");
        assert_eq!(prompter.read_video_id().unwrap(), "abc123");
    }

    #[test]
    fn reject_blank() {
        for input in ["\n", "\r\n", "   \n", "\t\n", ""] {
            let mut prompter = new_prompter(input);
            assert!(matches!(prompter.read_video_id(), Err(Error::EmptyInput(InputField::VideoId))), "{:?}", input);

            let mut prompter = new_prompter(input);
            assert!(matches!(prompter.read_image_path(), Err(Error::EmptyInput(InputField::ImagePath))), "{:?}", input);
        }
    }

    #[test]
    fn empty_messages() {
        assert_eq!(Error::EmptyInput(InputField::VideoId).to_string(), "Video Id can't be empty!");
        assert_eq!(Error::EmptyInput(InputField::ImagePath).to_string(), "Path can not be empty!");
    }
}
