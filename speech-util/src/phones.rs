use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read a two-column phone mapping file (e.g. the TIMIT 48→39 folding):
/// one `source target` pair per line, whitespace separated.
pub fn read_phone_map(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening phone map {}", path.display()))?,
    );
    let mut map = HashMap::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut cols = line.split_whitespace();
        let (Some(src), Some(dst)) = (cols.next(), cols.next()) else {
            anyhow::bail!(
                "{}:{}: expected two columns, got {:?}",
                path.display(),
                lineno + 1,
                line
            );
        };
        map.insert(src.to_string(), dst.to_string());
    }
    Ok(map)
}

/// Apply a phone map to a sequence. Phones without a mapping pass through
/// unchanged.
pub fn map_phones(phones: &[String], map: &HashMap<String, String>) -> Vec<String> {
    phones
        .iter()
        .map(|p| map.get(p).cloned().unwrap_or_else(|| p.clone()))
        .collect()
}

/// Phone inventory with a fixed number of HMM emission states per phone.
///
/// State ids are laid out contiguously: phone `i` owns states
/// `[i * states_per_phone, (i + 1) * states_per_phone)`.
pub struct PhoneInventory {
    phones: Vec<String>,
    phone_ids: HashMap<String, usize>,
    states_per_phone: usize,
}

impl PhoneInventory {
    pub fn new(phones: Vec<String>, states_per_phone: usize) -> Result<Self> {
        anyhow::ensure!(!phones.is_empty(), "phone inventory is empty");
        anyhow::ensure!(states_per_phone > 0, "states_per_phone must be positive");
        let phone_ids = phones
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        Ok(Self {
            phones,
            phone_ids,
            states_per_phone,
        })
    }

    /// Read an inventory file, one phone per line.
    pub fn from_file(path: impl AsRef<Path>, states_per_phone: usize) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(
            File::open(path)
                .with_context(|| format!("opening phone inventory {}", path.display()))?,
        );
        let mut phones = vec![];
        for line in reader.lines() {
            let line = line?;
            let phone = line.trim();
            if !phone.is_empty() {
                phones.push(phone.to_string());
            }
        }
        Self::new(phones, states_per_phone)
            .with_context(|| format!("reading phone inventory {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.phones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phones.is_empty()
    }

    pub fn states_per_phone(&self) -> usize {
        self.states_per_phone
    }

    pub fn num_states(&self) -> usize {
        self.phones.len() * self.states_per_phone
    }

    pub fn phone_id(&self, phone: &str) -> Option<usize> {
        self.phone_ids.get(phone).copied()
    }

    /// Phone owning the given emission state.
    pub fn state_phone(&self, state: usize) -> Option<&str> {
        self.phones
            .get(state / self.states_per_phone)
            .map(|p| p.as_str())
    }

    /// Whether `state` is the last emission state of its phone.
    pub fn is_final_state(&self, state: usize) -> bool {
        state < self.num_states() && state % self.states_per_phone == self.states_per_phone - 1
    }
}
