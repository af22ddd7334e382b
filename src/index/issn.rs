//! ISSN-L → all base.

use super::{ConflictPolicy, LoaderConfig, push_unique, require_columns, table_reader};
use crate::utils::{format_issn, split_values, standardize_issn};
use crate::{Issn, NormalizedTitle, Result};
use std::collections::HashMap;
use std::io::Read;

/// Member ISSNs and title variants of one ISSN-L.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssnEntry {
    pub issns: Vec<Issn>,
    pub titles: Vec<NormalizedTitle>,
}

/// Maps every known ISSN to its unique ISSN-L, and every ISSN-L to its members and
/// title variants.
#[derive(Debug, Clone, Default)]
pub struct IssnIndex {
    issnl_by_issn: HashMap<Issn, Issn>,
    entries: HashMap<Issn, IssnEntry>,
    conflicts: usize,
    policy: ConflictPolicy,
}

impl IssnIndex {
    /// Reads `issnl | issn1#issn2#... | title1#title2#...` rows into an empty index.
    pub fn from_reader<R: Read>(reader: R, base_name: &str, config: &LoaderConfig) -> Result<Self> {
        let mut index = Self::default();
        index.extend_from_reader(reader, base_name, config)?;
        Ok(index)
    }

    /// Merges a lower-priority base into the index.
    pub fn extend_from_reader<R: Read>(
        &mut self,
        reader: R,
        base_name: &str,
        config: &LoaderConfig,
    ) -> Result<()> {
        self.policy = config.conflict_policy;
        let mut reader = table_reader(reader, b'|', config);

        for result in reader.records() {
            let record = result?;
            require_columns(&record, 3, base_name)?;

            let issnl = standardize_issn(&record[0]);
            if issnl.is_empty() {
                tracing::debug!(base = base_name, "skipping row with empty ISSN-L");
                continue;
            }

            let issns: Vec<Issn> = split_values(&record[1], '#').map(standardize_issn).collect();
            let titles = split_values(&record[2], '#')
                .map(NormalizedTitle::new)
                .filter(|t| !t.is_empty());

            self.insert(issnl, issns, titles, base_name);
        }

        Ok(())
    }

    fn insert(
        &mut self,
        issnl: Issn,
        issns: Vec<Issn>,
        titles: impl Iterator<Item = NormalizedTitle>,
        base_name: &str,
    ) {
        let entry = self.entries.entry(issnl.clone()).or_default();
        for title in titles {
            if !entry.titles.contains(&title) {
                entry.titles.push(title);
            }
        }

        // An ISSN-L is a member of its own group
        self.assign(issnl.clone(), &issnl, base_name);
        for issn in issns {
            self.assign(issn, &issnl, base_name);
        }
    }

    fn assign(&mut self, issn: Issn, issnl: &Issn, base_name: &str) {
        match self.issnl_by_issn.get(&issn).cloned() {
            Some(current) if current == *issnl => {}
            Some(current) => {
                self.conflicts += 1;
                let (kept, discarded) = match self.policy {
                    ConflictPolicy::FirstSeen => (&current, issnl),
                    ConflictPolicy::LastSeen => (issnl, &current),
                };
                tracing::warn!(
                    base = base_name,
                    issn = %issn,
                    kept = %kept,
                    discarded = %discarded,
                    "ISSN assigned to more than one ISSN-L"
                );

                if self.policy == ConflictPolicy::LastSeen {
                    if let Some(entry) = self.entries.get_mut(&current) {
                        entry.issns.retain(|member| *member != issn);
                    }
                    self.register(issn, issnl);
                }
            }
            None => self.register(issn, issnl),
        }
    }

    fn register(&mut self, issn: Issn, issnl: &Issn) {
        let entry = self.entries.entry(issnl.clone()).or_default();
        push_unique(&mut entry.issns, issn.clone());
        self.issnl_by_issn.insert(issn, issnl.clone());
    }

    /// The ISSN-L of a standardized ISSN.
    pub fn issnl_of(&self, issn: &str) -> Option<&Issn> {
        self.issnl_by_issn.get(issn)
    }

    /// Standardizes `raw` and maps it to its ISSN-L, falling back to the ISSN itself.
    pub fn issnl_or_self(&self, raw: &str) -> Issn {
        let issn = standardize_issn(raw);
        self.issnl_by_issn.get(&issn).cloned().unwrap_or(issn)
    }

    /// Whether `raw` is a valid ISSN known to the index.
    pub fn contains(&self, raw: &str) -> bool {
        format_issn(raw).is_some_and(|issn| self.issnl_by_issn.contains_key(&issn))
    }

    pub fn entry(&self, issnl: &str) -> Option<&IssnEntry> {
        self.entries.get(issnl)
    }

    /// Member ISSNs of an ISSN-L, the ISSN-L itself first.
    pub fn issns_of(&self, issnl: &str) -> &[Issn] {
        self.entries
            .get(issnl)
            .map(|entry| entry.issns.as_slice())
            .unwrap_or_default()
    }

    /// Title variants registered for an ISSN-L.
    pub fn variant_titles(&self, issnl: &str) -> &[NormalizedTitle] {
        self.entries
            .get(issnl)
            .map(|entry| entry.titles.as_slice())
            .unwrap_or_default()
    }

    /// Number of ISSNs with an ISSN-L.
    pub fn len(&self) -> usize {
        self.issnl_by_issn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issnl_by_issn.is_empty()
    }

    /// Number of conflicting assignments seen while loading.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const PRIMARY: &str = "0034-8910|0034-8910#1518-8787|REV SAUDE PUBLICA#REVISTA DE SAUDE PUBLICA\n\
                           0102-311X|0102311x#1678-4464|CAD SAUDE PUBLICA\n";

    fn load(policy: ConflictPolicy, bases: &[&str]) -> IssnIndex {
        let mut config = LoaderConfig::default();
        config.set_conflict_policy(policy);

        let mut index = IssnIndex::default();
        for (i, base) in bases.iter().enumerate() {
            index
                .extend_from_reader(base.as_bytes(), &format!("base{i}"), &config)
                .unwrap();
        }
        index
    }

    #[test]
    fn test_parse_issn_base() {
        let index = load(ConflictPolicy::FirstSeen, &[PRIMARY]);

        assert_eq!(index.issnl_of("1518-8787"), Some(&Issn::from("0034-8910")));
        assert_eq!(index.issnl_of("0034-8910"), Some(&Issn::from("0034-8910")));
        assert_eq!(index.issnl_of("0102-311X"), Some(&Issn::from("0102-311X")));
        assert_eq!(
            index.issns_of("0034-8910"),
            &[Issn::from("0034-8910"), Issn::from("1518-8787")]
        );
        assert_eq!(
            index.variant_titles("0034-8910"),
            &[
                NormalizedTitle::new("REV SAUDE PUBLICA"),
                NormalizedTitle::new("REVISTA DE SAUDE PUBLICA")
            ]
        );
        assert_eq!(index.len(), 4);
        assert_eq!(index.conflicts(), 0);
    }

    #[test]
    fn test_issnl_or_self() {
        let index = load(ConflictPolicy::FirstSeen, &[PRIMARY]);
        assert_eq!(index.issnl_or_self("15188787"), Issn::from("0034-8910"));
        assert_eq!(index.issnl_or_self("2222-3333"), Issn::from("2222-3333"));
        assert!(index.contains("1678 4464"));
        assert!(!index.contains("2222-3333"));
    }

    #[rstest]
    #[case(ConflictPolicy::FirstSeen, "0034-8910")]
    #[case(ConflictPolicy::LastSeen, "9999-9999")]
    fn test_conflicting_assignment(#[case] policy: ConflictPolicy, #[case] expected: &str) {
        let secondary = "9999-9999|1518-8787|OUTRA REVISTA\n";
        let index = load(policy, &[PRIMARY, secondary]);

        assert_eq!(index.issnl_of("1518-8787"), Some(&Issn::from(expected)));
        assert_eq!(index.conflicts(), 1);

        // The ISSN belongs to exactly one group afterwards
        let owners = ["0034-8910", "9999-9999"]
            .iter()
            .filter(|issnl| index.issns_of(issnl).contains(&Issn::from("1518-8787")))
            .count();
        assert_eq!(owners, 1);
    }

    #[test]
    fn test_repeated_rows_are_not_conflicts() {
        let index = load(ConflictPolicy::FirstSeen, &[PRIMARY, PRIMARY]);
        assert_eq!(index.conflicts(), 0);
        assert_eq!(index.variant_titles("0102-311X").len(), 1);
    }
}
