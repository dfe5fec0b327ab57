//! Prints the `users` and `predictions` tables of the configured store.

use anyhow::Context;
use futures_util::TryStreamExt;
use riskstore::{
    config::StoreConfig,
    store::{self, OpenMode, Prediction, User},
    telemetry,
};

/// Cells wider than this are cut so long digests do not wreck the layout.
const MAX_CELL: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init("riskstore=warn");

    let cfg = StoreConfig::from_env("", "sqlite")?;
    let store = store::connect_with_mode(&cfg, OpenMode::ReadOnly)
        .await
        .with_context(|| format!("open {} store", cfg.backend_name()))?;

    println!("\n=== USERS TABLE ===");
    let users: Vec<User> = store.stream_users().try_collect().await?;
    if users.is_empty() {
        println!("No users found.");
    } else {
        let rows: Vec<Vec<String>> = users.iter().map(user_row).collect();
        print!("{}", render_table(USER_HEADER, &rows));
    }

    println!("\n{}\n", "=".repeat(50));

    println!("=== PREDICTIONS TABLE ===");
    let predictions: Vec<Prediction> = store.stream_predictions().try_collect().await?;
    if predictions.is_empty() {
        println!("No predictions found.");
    } else {
        let rows: Vec<Vec<String>> = predictions.iter().map(prediction_row).collect();
        print!("{}", render_table(PREDICTION_HEADER, &rows));
    }
    Ok(())
}

const USER_HEADER: &[&str] = &[
    "id",
    "username",
    "email",
    "password_hash",
    "full_name",
    "created_at",
    "updated_at",
];

const PREDICTION_HEADER: &[&str] = &[
    "id",
    "user_id",
    "pregnancies",
    "glucose",
    "blood_pressure",
    "skin_thickness",
    "insulin",
    "bmi",
    "diabetes_pedigree_function",
    "age",
    "prediction",
    "created_at",
];

fn user_row(u: &User) -> Vec<String> {
    vec![
        u.id.to_string(),
        u.username.clone(),
        u.email.clone(),
        u.password_hash.clone(),
        u.full_name.clone().unwrap_or_else(|| "None".into()),
        u.created_at.to_string(),
        u.updated_at.to_string(),
    ]
}

fn prediction_row(p: &Prediction) -> Vec<String> {
    let f = &p.features;
    vec![
        p.id.to_string(),
        p.user_id.to_string(),
        f.pregnancies.to_string(),
        f.glucose.to_string(),
        f.blood_pressure.to_string(),
        f.skin_thickness.to_string(),
        f.insulin.to_string(),
        f.bmi.to_string(),
        f.diabetes_pedigree_function.to_string(),
        f.age.to_string(),
        i32::from(p.prediction).to_string(),
        p.created_at.to_string(),
    ]
}

fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let cut = |s: &str| s.chars().take(MAX_CELL).collect::<String>();
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cut(cell).chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let head = line(header.iter().map(|h| h.to_string()).collect());
    let mut out = format!("{head}\n{}\n", "-".repeat(head.len()));
    for row in rows {
        out.push_str(&line(row.iter().map(|c| cut(c)).collect()));
        out.push('\n');
    }
    out
}
