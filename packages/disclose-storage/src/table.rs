//! Header-addressed CSV tables.
//!
//! Every file is written as UTF-8 with a leading byte order mark so spreadsheet tools pick the
//! right encoding. Reads accept files with or without the mark.

use std::{
	fs::{self, File},
	io::{BufWriter, Write},
	path::{Path, PathBuf},
};

use csv::{ReaderBuilder, WriterBuilder};

use crate::{Error, Result};

pub const UTF8_BOM: &str = "\u{feff}";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
	pub headers: Vec<String>,
	pub rows: Vec<Vec<String>>,
}
impl Table {
	pub fn new<I, S>(headers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { headers: headers.into_iter().map(Into::into).collect(), rows: Vec::new() }
	}

	/// Reads a CSV file. Short rows are padded with empty cells, long rows are cut to the header
	/// width.
	pub fn read(path: &Path) -> Result<Self> {
		let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
		let headers: Vec<String> = reader
			.headers()?
			.iter()
			.enumerate()
			.map(|(idx, raw)| {
				let raw = if idx == 0 { raw.trim_start_matches(UTF8_BOM) } else { raw };

				raw.trim().to_string()
			})
			.collect();
		let width = headers.len();
		let mut rows = Vec::new();

		for record in reader.records() {
			let record = record?;
			let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();

			row.resize(width, String::new());
			rows.push(row);
		}

		Ok(Self { headers, rows })
	}

	/// Writes the table through a sibling temporary file so an interrupted write never leaves a
	/// truncated table behind.
	pub fn write(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent()
			&& !parent.as_os_str().is_empty()
		{
			fs::create_dir_all(parent)?;
		}

		let tmp = temp_path(path);

		{
			let mut file = BufWriter::new(File::create(&tmp)?);

			file.write_all(UTF8_BOM.as_bytes())?;

			let mut writer = WriterBuilder::new().from_writer(file);

			writer.write_record(&self.headers)?;

			for row in &self.rows {
				writer.write_record(row)?;
			}

			writer.flush()?;
		}

		fs::rename(&tmp, path)?;

		Ok(())
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn column(&self, name: &str) -> Option<usize> {
		self.headers.iter().position(|header| header == name)
	}

	/// First column present among `aliases`, in alias order.
	pub fn find_column(&self, aliases: &[&str]) -> Option<usize> {
		aliases.iter().find_map(|alias| self.column(alias))
	}

	pub fn require_column(&self, path: &Path, aliases: &[&str]) -> Result<usize> {
		self.find_column(aliases).ok_or_else(|| Error::MissingColumn {
			path: path.to_path_buf(),
			column: aliases.join(" / "),
		})
	}

	/// Returns the index of `name`, appending an empty column when absent.
	pub fn ensure_column(&mut self, name: &str) -> usize {
		if let Some(idx) = self.column(name) {
			return idx;
		}

		self.headers.push(name.to_string());

		for row in &mut self.rows {
			row.push(String::new());
		}

		self.headers.len() - 1
	}

	pub fn cell(&self, row: usize, col: usize) -> &str {
		self.rows.get(row).and_then(|cells| cells.get(col)).map(String::as_str).unwrap_or("")
	}

	/// First non-blank trimmed cell among the alias columns, in alias order.
	pub fn value(&self, row: usize, aliases: &[&str]) -> Option<&str> {
		aliases
			.iter()
			.filter_map(|alias| self.column(alias))
			.map(|col| self.cell(row, col).trim())
			.find(|value| !value.is_empty())
	}

	pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
		if let Some(cell) = self.rows.get_mut(row).and_then(|cells| cells.get_mut(col)) {
			*cell = value.into();
		}
	}

	pub fn push_row(&mut self, mut row: Vec<String>) {
		row.resize(self.headers.len(), String::new());
		self.rows.push(row);
	}
}

fn temp_path(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();

	name.push(".tmp");

	path.with_file_name(name)
}
