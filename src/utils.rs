use std::{
    fs::File,
    io::{stdout, Write},
    path::Path,
    time::Duration,
};

use eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Allows for writing to File or Stdout depending on if a filename is given.
pub fn stdout_or_file<P>(filename: Option<&P>) -> Result<Box<dyn Write>>
where
    P: AsRef<Path>,
{
    if let Some(fp) = filename {
        let handle = File::create(fp)?;
        Ok(Box::new(handle))
    } else {
        let handle = stdout().lock();
        Ok(Box::new(handle))
    }
}

/// Run `f` behind a spinner showing `msg`.
pub fn with_spinner<F, T>(msg: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?;
    let p = ProgressBar::new_spinner().with_style(style).with_message(msg);
    p.enable_steady_tick(Duration::from_millis(100));
    match f() {
        Ok(x) => {
            p.finish_with_message(format!("\"{msg}\" complete"));
            Ok(x)
        }
        Err(e) => {
            p.finish_with_message(format!("\"{msg}\" failed"));
            Err(e)
        }
    }
}

#[cfg(test)]
mod test {
    use assert_fs::{prelude::*, TempDir};

    use super::*;

    #[test]
    fn test_stdout_or_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.child("out.txt");
        {
            let mut writer = stdout_or_file(Some(&path.path()))?;
            writeln!(writer, "hello")?;
        }
        path.assert("hello\n");
        Ok(())
    }

    #[test]
    fn test_with_spinner() {
        assert_eq!(with_spinner("adding", || Ok(1 + 1)).unwrap(), 2);
        assert!(with_spinner::<_, ()>("failing", || Err(eyre::eyre!("failed"))).is_err());
    }
}
