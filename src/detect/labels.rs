use std::path::Path;

use anyhow::{Context, Result};

/// Class-id → description table.
#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn from_static(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|label| label.to_string()).collect(),
        }
    }

    /// Load one label per line. Lines may carry a leading synset id
    /// (`n01440764 tench, Tinca tinca`), which is stripped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        let labels = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(strip_synset)
            .collect();
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Description for `class_id`; unknown ids get a generic name.
    pub fn get(&self, class_id: u32) -> String {
        self.labels
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class #{}", class_id))
    }
}

fn strip_synset(line: &str) -> String {
    match line.split_once(' ') {
        Some((id, rest))
            if id.len() == 9 && id.starts_with('n') && id[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            rest.trim().to_string()
        }
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_ids_get_generic_names() {
        let labels = LabelMap::from_static(&["background", "person"]);
        assert_eq!(labels.get(1), "person");
        assert_eq!(labels.get(7), "class #7");
    }

    #[test]
    fn file_labels_drop_synset_prefixes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "n01440764 tench, Tinca tinca").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "goldfish").unwrap();
        let labels = LabelMap::from_file(file.path()).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(0), "tench, Tinca tinca");
        assert_eq!(labels.get(1), "goldfish");
    }
}
