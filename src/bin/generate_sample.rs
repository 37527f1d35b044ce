use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// (Country, Region, Income)
const COUNTRIES: &[(&str, &str, &str)] = &[
    ("Chile", "Latin America & Caribbean", "High income"),
    ("Peru", "Latin America & Caribbean", "Upper middle income"),
    ("Bolivia", "Latin America & Caribbean", "Lower middle income"),
    ("Kenya", "Sub-Saharan Africa", "Lower middle income"),
    ("Cote d'Ivoire", "Sub-Saharan Africa", "Lower middle income"),
    ("Cabo Verde", "Sub-Saharan Africa", "Lower middle income"),
    ("Niger", "Sub-Saharan Africa", "Low income"),
    ("Nepal", "South Asia", "Lower middle income"),
    ("Bangladesh", "South Asia", "Lower middle income"),
    ("Korea, Rep.", "East Asia & Pacific", "High income"),
    ("Viet Nam", "East Asia & Pacific", "Lower middle income"),
    ("Jordan", "Middle East & North Africa", "Upper middle income"),
];

fn snapshot_url(country: &str) -> String {
    let slug: String = country
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .to_lowercase()
        .replace(' ', "-");
    format!("https://education-profiles.org/snapshots/{slug}")
}

/// `governance.csv`: no Theme column, Yes/No policy flags, 999 for "no data".
fn write_governance(dir: &Path, rng: &mut SimpleRng) -> Result<PathBuf> {
    let path = dir.join("governance.csv");
    let mut writer = csv::Writer::from_path(&path).context("creating governance.csv")?;
    writer.write_record([
        "Country",
        "Region",
        "Income",
        "Has education law",
        "Private schools regulated",
        "Share of budget (%)",
        "SnapshotURL",
    ])?;
    for &(country, region, income) in COUNTRIES {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        let law = yes_no(rng.chance(0.7));
        let regulated = if rng.chance(0.15) {
            ""
        } else {
            yes_no(rng.chance(0.5))
        };
        let share = if rng.chance(0.2) {
            "999".to_string()
        } else {
            format!("{:.1}", 8.0 + rng.next_f64() * 12.0)
        };
        writer.write_record([
            country,
            region,
            income,
            law,
            regulated,
            share.as_str(),
            snapshot_url(country).as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

/// `finance.parquet`: explicit Theme column holding two themes.
fn write_finance(dir: &Path, rng: &mut SimpleRng) -> Result<PathBuf> {
    let mut theme = Vec::new();
    let mut country = Vec::new();
    let mut region = Vec::new();
    let mut income = Vec::new();
    let mut spending = Vec::new();
    let mut aid = Vec::new();

    for &(c, r, i) in COUNTRIES {
        for t in ["Finance", "Equity"] {
            theme.push(t);
            country.push(c);
            region.push(r);
            income.push(i);
            spending.push(Some(200.0 + rng.next_f64() * 1800.0));
            aid.push(if rng.chance(0.25) {
                None
            } else {
                Some((rng.next_f64() * 40.0).round())
            });
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("Theme", DataType::Utf8, false),
        Field::new("Country", DataType::Utf8, false),
        Field::new("Region", DataType::Utf8, false),
        Field::new("Income", DataType::Utf8, false),
        Field::new("Spending per student (USD)", DataType::Float64, true),
        Field::new("Aid share (%)", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(theme)),
            Arc::new(StringArray::from(country)),
            Arc::new(StringArray::from(region)),
            Arc::new(StringArray::from(income)),
            Arc::new(Float64Array::from(spending)),
            Arc::new(Float64Array::from(aid)),
        ],
    )
    .context("building record batch")?;

    let path = dir.join("finance.parquet");
    let file = std::fs::File::create(&path).context("creating finance.parquet")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(path)
}

fn main() -> Result<()> {
    let dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "data".to_string()));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    for path in [write_governance(&dir, &mut rng)?, write_finance(&dir, &mut rng)?] {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
