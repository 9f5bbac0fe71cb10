use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Writes one encoded task per line, replacing any previous file.
pub fn write_task_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        // Anything after an embedded newline would become a separate task.
        let single = line.lines().next().unwrap_or("");
        writer.write_all(single.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Reads encoded task lines, trimmed, with blank lines dropped.
pub fn read_task_lines(path: &Path) -> io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_task() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out").join("tasks.txt");
        let lines = vec![
            "Buy milk [Due: 05/03/2024] [Important]".to_string(),
            "Flagged: Reply to client".to_string(),
        ];
        write_task_lines(&path, &lines).expect("write");

        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(
            content,
            "Buy milk [Due: 05/03/2024] [Important]\nFlagged: Reply to client\n"
        );
        assert_eq!(read_task_lines(&path).expect("read back"), lines);
    }

    #[test]
    fn read_skips_blank_lines_and_trims() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tasks.txt");
        fs::write(&path, "  Buy milk  \n\n\t\nAssigned: Review\r\n").expect("seed");
        assert_eq!(
            read_task_lines(&path).expect("read"),
            vec!["Buy milk".to_string(), "Assigned: Review".to_string()]
        );
    }

    #[test]
    fn multiline_titles_are_truncated_at_first_newline() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tasks.txt");
        write_task_lines(&path, &["first\nsecond".to_string()]).expect("write");
        assert_eq!(read_task_lines(&path).expect("read"), vec!["first".to_string()]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(read_task_lines(&dir.path().join("absent.txt")).is_err());
    }
}
