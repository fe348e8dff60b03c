use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read a transcription file: one utterance per line,
/// `<uttid> <phone> <phone> ...`. The phone sequence may be empty (e.g. a
/// silence-only utterance), the utterance id may not.
pub fn read_transcriptions(path: impl AsRef<Path>) -> Result<HashMap<String, Vec<String>>> {
    let path = path.as_ref();
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening transcriptions {}", path.display()))?,
    );
    let mut transcriptions = HashMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let mut cols = line.split_whitespace();
        let Some(utt) = cols.next() else {
            continue; // blank line
        };
        let phones: Vec<String> = cols.map(|p| p.to_string()).collect();
        if transcriptions.insert(utt.to_string(), phones).is_some() {
            anyhow::bail!(
                "{}:{}: duplicate utterance id {:?}",
                path.display(),
                lineno + 1,
                utt
            );
        }
    }
    Ok(transcriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_transcriptions() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "utt1 sil aa b sil")?;
        writeln!(file, "utt2 k ih t")?;
        writeln!(file)?;
        writeln!(file, "utt3")?;

        let trans = read_transcriptions(file.path())?;
        assert_eq!(trans.len(), 3);
        assert_eq!(
            trans.get("utt1").unwrap(),
            &["sil", "aa", "b", "sil"]
        );
        assert!(trans.get("utt3").unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_utterance_rejected() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "utt1 aa")?;
        writeln!(file, "utt1 b")?;
        assert!(read_transcriptions(file.path()).is_err());
        Ok(())
    }
}
