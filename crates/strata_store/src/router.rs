use sea_orm::sea_query::Alias;

use strata_core::{StrataError, StrataResult, ValueKind};

const MAX_PREFIX_LEN: usize = 48;

#[derive(Clone, Debug)]
pub struct PartitionRouter {
    prefix: String,
    tables: [String; 5],
}

impl PartitionRouter {
    pub fn new(prefix: Option<&str>) -> StrataResult<Self> {
        let prefix =
            prefix.ok_or_else(|| StrataError::not_initialized("no store prefix configured"))?;
        validate_prefix(prefix)?;
        let tables = ValueKind::ALL.map(|kind| format!("{prefix}_{}", kind.suffix()));
        Ok(Self {
            prefix: prefix.to_string(),
            tables,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn table_name(&self, kind: ValueKind) -> &str {
        &self.tables[slot(kind)]
    }

    pub fn table(&self, kind: ValueKind) -> Alias {
        Alias::new(self.table_name(kind))
    }

    pub fn table_for_tag(&self, tag: &str) -> StrataResult<&str> {
        Ok(self.table_name(ValueKind::from_tag(tag)?))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }
}

fn slot(kind: ValueKind) -> usize {
    match kind {
        ValueKind::String => 0,
        ValueKind::Number => 1,
        ValueKind::Boolean => 2,
        ValueKind::Date => 3,
        ValueKind::Array => 4,
    }
}

fn validate_prefix(prefix: &str) -> StrataResult<()> {
    if prefix.is_empty() {
        return Err(StrataError::invalid("store prefix must not be empty"));
    }
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(StrataError::invalid(format!(
            "store prefix exceeds {MAX_PREFIX_LEN} characters"
        )));
    }
    let mut chars = prefix.chars();
    let leading_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !leading_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StrataError::invalid(format!(
            "store prefix '{prefix}' is not a plain identifier"
        )));
    }
    Ok(())
}
