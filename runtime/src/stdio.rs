//! The host-settable standard stream handles.

use std::io::{self, BufRead, Write};

use pyrite_common::lock::{Lazy, PyMutex};

static STDIN: Lazy<PyMutex<Box<dyn BufRead + Send>>> =
    Lazy::new(|| PyMutex::new(Box::new(io::BufReader::new(io::stdin()))));
static STDOUT: Lazy<PyMutex<Box<dyn Write + Send>>> =
    Lazy::new(|| PyMutex::new(Box::new(io::stdout())));
static STDERR: Lazy<PyMutex<Box<dyn Write + Send>>> =
    Lazy::new(|| PyMutex::new(Box::new(io::stderr())));

pub fn set_stdin(reader: Box<dyn BufRead + Send>) {
    *STDIN.lock() = reader;
}

pub fn set_stdout(writer: Box<dyn Write + Send>) {
    *STDOUT.lock() = writer;
}

pub fn set_stderr(writer: Box<dyn Write + Send>) {
    *STDERR.lock() = writer;
}

pub fn write_stdout(s: &str) {
    let mut out = STDOUT.lock();
    let _ = out.write_all(s.as_bytes());
    let _ = out.flush();
}

pub fn write_stderr(s: &str) {
    let mut err = STDERR.lock();
    let _ = err.write_all(s.as_bytes());
    let _ = err.flush();
}

/// One line from the input handle, without the trailing newline; `None` at
/// end of input.
pub fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    let n = STDIN.lock().read_line(&mut line)?;
    if n == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stderr_is_settable() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        set_stderr(Box::new(Capture(sink.clone())));
        write_stderr("boom\n");
        let captured = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert!(captured.contains("boom"));
        set_stderr(Box::new(io::stderr()));
    }
}
