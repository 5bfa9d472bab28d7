//! `schema.txt` encoding.
//!
//! ```text
//! [users]
//! id:string:pk,unique
//! name:string
//!
//! [posts]
//! id:string:pk,unique
//! users_id:string:fk=users.id
//! ```
//!
//! A `[Name]` line opens a section. Non-blank lines after it are field
//! definitions of that table. Blank lines, and anything before the first
//! section, are ignored.

use super::{FieldDef, Schema, TableSchema};
use crate::error::{CoreError, CoreResult};

impl Schema {
    /// Parses schema text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for a duplicated section, an invalid section
    /// name, or a field line that fails validation.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let mut schema = Self::new();
        let mut current: Option<usize> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = section_name(line) {
                let name = name.trim();
                if schema.has_table(name) {
                    return Err(CoreError::invalid_format(format!(
                        "schema line {line_no}: duplicate table [{name}]"
                    )));
                }
                schema.add_table(name).map_err(|e| {
                    CoreError::invalid_format(format!("schema line {line_no}: {e}"))
                })?;
                // add_table seeds `id`; the file is authoritative for fields.
                let last = schema.tables.len() - 1;
                schema.tables[last].fields.clear();
                current = Some(last);
                continue;
            }

            let Some(table_index) = current else {
                continue;
            };
            let field = FieldDef::parse(line).map_err(|e| {
                CoreError::invalid_format(format!("schema line {line_no}: {e}"))
            })?;
            let table = &mut schema.tables[table_index];
            if table.has_field(&field.name) {
                return Err(CoreError::invalid_format(format!(
                    "schema line {line_no}: duplicate field {}.{}",
                    table.name, field.name
                )));
            }
            table.fields.push(field);
        }

        Ok(schema)
    }

    /// Renders the schema as text. `parse(to_text())` yields the same schema.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_table(table, &mut out);
        }
        out
    }
}

fn section_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}

fn render_table(table: &TableSchema, out: &mut String) {
    out.push('[');
    out.push_str(&table.name);
    out.push_str("]\n");
    for field in &table.fields {
        out.push_str(&field.to_string());
        out.push('\n');
    }
}
