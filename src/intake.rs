//! Run parameters: what product to research and where to put the reports.
//!
//! Values come from CLI flags first; anything missing is asked for
//! interactively, in a fixed order.

use clap::Args;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("no value provided for {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Product and destination for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeRecord {
    product_name: String,
    category: Option<String>,
    brand: Option<String>,
    edition: Option<String>,
    output_directory: PathBuf,
}

impl IntakeRecord {
    pub fn new(
        product_name: impl Into<String>,
        output_directory: impl Into<PathBuf>,
    ) -> Result<Self, IntakeError> {
        let product_name = product_name.into().trim().to_string();
        if product_name.is_empty() {
            return Err(IntakeError::InvalidField {
                field: "product name",
                reason: "must not be blank".to_string(),
            });
        }

        let output_directory = output_directory.into();
        validate_output_directory(&output_directory)?;

        Ok(Self {
            product_name,
            category: None,
            brand: None,
            edition: None,
            output_directory,
        })
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = non_blank(category);
        self
    }

    pub fn with_brand(mut self, brand: Option<String>) -> Self {
        self.brand = non_blank(brand);
        self
    }

    pub fn with_edition(mut self, edition: Option<String>) -> Self {
        self.edition = non_blank(edition);
        self
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    pub fn edition(&self) -> Option<&str> {
        self.edition.as_deref()
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Product name plus whatever brand, category and edition were given,
    /// e.g. `PlayStation 5 (brand: Sony, category: videogame)`
    pub fn product_label(&self) -> String {
        let details: Vec<String> = [
            ("brand", &self.brand),
            ("category", &self.category),
            ("edition", &self.edition),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
        .collect();

        if details.is_empty() {
            self.product_name.clone()
        } else {
            format!("{} ({})", self.product_name, details.join(", "))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_output_directory(path: &Path) -> Result<(), IntakeError> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(IntakeError::InvalidField {
            field: "output directory",
            reason: "must not be blank".to_string(),
        });
    }
    if path.exists() && !path.is_dir() {
        return Err(IntakeError::InvalidField {
            field: "output directory",
            reason: format!("{} exists and is not a directory", path.display()),
        });
    }
    Ok(())
}

/// Intake values supplied on the command line
#[derive(Debug, Clone, Default, Args)]
pub struct IntakeArgs {
    /// Full product name to research
    #[arg(long)]
    pub product: Option<String>,

    /// Product category (e.g. videogame, accessory)
    #[arg(long)]
    pub category: Option<String>,

    /// Product brand
    #[arg(long)]
    pub brand: Option<String>,

    /// Product edition, if applicable (e.g. limited edition, bundle)
    #[arg(long)]
    pub edition: Option<String>,

    /// Directory for the reports; created if missing
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,
}

const OUTPUT_DIR_PROMPT: &str =
    "Choose the directory to save the results in. It will be created if it does not exist:";
const PRODUCT_PROMPT: &str =
    "Enter the full name of the product to research (e.g. Playstation 5, Xbox Series X):";
const CATEGORY_PROMPT: &str = "Enter the product category (e.g. videogame, accessory):";
const BRAND_PROMPT: &str = "Enter the product brand (e.g. Sony, Microsoft, Logitech):";
const EDITION_PROMPT: &str =
    "Enter the product edition, if applicable (e.g. limited edition, bundle):";

/// Build the intake record, prompting on `writer` for every value `args`
/// leaves out: output directory, product name, category, brand, edition.
///
/// Optional values may be answered with an empty line. End of input on a
/// required value is [`IntakeError::MissingField`].
pub fn collect_intake<R: BufRead, W: Write>(
    args: IntakeArgs,
    reader: &mut R,
    writer: &mut W,
) -> Result<IntakeRecord, IntakeError> {
    let output_directory = match args.output_dir {
        Some(dir) => dir,
        None => PathBuf::from(
            prompt(reader, writer, OUTPUT_DIR_PROMPT)?
                .ok_or(IntakeError::MissingField("output directory"))?,
        ),
    };

    let product_name = match args.product {
        Some(product) => product,
        None => prompt(reader, writer, PRODUCT_PROMPT)?
            .ok_or(IntakeError::MissingField("product name"))?,
    };

    let category = optional(args.category, reader, writer, CATEGORY_PROMPT)?;
    let brand = optional(args.brand, reader, writer, BRAND_PROMPT)?;
    let edition = optional(args.edition, reader, writer, EDITION_PROMPT)?;

    let record = IntakeRecord::new(product_name, output_directory)?
        .with_category(category)
        .with_brand(brand)
        .with_edition(edition);

    tracing::debug!(
        product = %record.product_name(),
        output = %record.output_directory().display(),
        "Intake collected"
    );
    Ok(record)
}

fn optional<R: BufRead, W: Write>(
    given: Option<String>,
    reader: &mut R,
    writer: &mut W,
    question: &str,
) -> Result<Option<String>, IntakeError> {
    match given {
        Some(value) => Ok(Some(value)),
        None => prompt(reader, writer, question),
    }
}

/// Ask one question; `None` on end of input
fn prompt<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    question: &str,
) -> Result<Option<String>, IntakeError> {
    writeln!(writer, "{question}")?;
    writer.flush()?;

    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn collect(args: IntakeArgs, input: &str) -> (Result<IntakeRecord, IntakeError>, String) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = collect_intake(args, &mut reader, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_prompts_in_order() {
        let (record, transcript) = collect(
            IntakeArgs::default(),
            "reports\nPlaystation 5\nvideogame\nSony\n\n",
        );
        let record = record.unwrap();

        assert_eq!(record.output_directory(), Path::new("reports"));
        assert_eq!(record.product_name(), "Playstation 5");
        assert_eq!(record.category(), Some("videogame"));
        assert_eq!(record.brand(), Some("Sony"));
        assert_eq!(record.edition(), None);

        let positions: Vec<usize> = [
            OUTPUT_DIR_PROMPT,
            PRODUCT_PROMPT,
            CATEGORY_PROMPT,
            BRAND_PROMPT,
            EDITION_PROMPT,
        ]
        .iter()
        .map(|p| transcript.find(p).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_flags_skip_prompts() {
        let args = IntakeArgs {
            product: Some("Widget X".to_string()),
            output_dir: Some(PathBuf::from("out")),
            category: Some("gadget".to_string()),
            brand: Some(String::new()),
            edition: Some("bundle".to_string()),
        };
        let (record, transcript) = collect(args, "");
        let record = record.unwrap();

        assert!(transcript.is_empty());
        assert_eq!(record.brand(), None);
        assert_eq!(record.edition(), Some("bundle"));
    }

    #[test]
    fn test_eof_on_required_field() {
        let (result, _) = collect(IntakeArgs::default(), "reports\n");
        assert!(matches!(result, Err(IntakeError::MissingField("product name"))));

        let (result, _) = collect(IntakeArgs::default(), "");
        assert!(matches!(
            result,
            Err(IntakeError::MissingField("output directory"))
        ));
    }

    #[test]
    fn test_eof_on_optional_fields_is_fine() {
        let (record, _) = collect(IntakeArgs::default(), "reports\nWidget X\n");
        let record = record.unwrap();
        assert_eq!(record.category(), None);
        assert_eq!(record.product_label(), "Widget X");
    }

    #[test]
    fn test_blank_product_rejected() {
        let (result, _) = collect(IntakeArgs::default(), "reports\n   \n");
        assert!(matches!(
            result,
            Err(IntakeError::InvalidField { field: "product name", .. })
        ));
    }

    #[test]
    fn test_output_directory_must_not_be_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(
            IntakeRecord::new("Widget X", &file),
            Err(IntakeError::InvalidField { field: "output directory", .. })
        ));
        assert!(IntakeRecord::new("Widget X", dir.path()).is_ok());
        assert!(IntakeRecord::new("Widget X", "  ").is_err());
    }

    #[test]
    fn test_product_label() {
        let record = IntakeRecord::new(" PlayStation 5 ", "out")
            .unwrap()
            .with_brand(Some("Sony".to_string()))
            .with_category(Some("videogame".to_string()))
            .with_edition(Some("  ".to_string()));

        assert_eq!(
            record.product_label(),
            "PlayStation 5 (brand: Sony, category: videogame)"
        );
    }
}
