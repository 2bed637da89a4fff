use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Parser;
use log::{error, info};

use pricing_assistant_lib::{input_loader, logger};
use pricing_assistant_lib::{
    AppConfig, Condition, DataSourceBackend, MarketAggregator, MarketAnalysis, MarketplaceSource,
    PriceRecommendationEngine,
};

#[derive(Parser, Debug)]
#[command(version, about = "Suggest a selling price from marketplace listings")]
struct Args {
    /// Product to search for
    query: Option<String>,

    /// Item condition: new, very_good, good, satisfactory
    #[arg(long, default_value = "good")]
    condition: String,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV of queries to price in one run (columns: query, condition)
    #[arg(long)]
    batch: Option<PathBuf>,

    /// Where batch results are written
    #[arg(long, default_value = "recommendations.csv")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref());
    let condition = Condition::from_label_or_default(&args.condition);

    let vinted: Box<dyn DataSourceBackend> = Box::new(MarketplaceSource::vinted(&config)?);
    let aggregator = MarketAggregator::new(vec![vinted], PriceRecommendationEngine::new(config.pricing.clone()));

    match (&args.batch, &args.query) {
        (Some(batch), _) => run_batch(&aggregator, batch, &args.output, condition),
        (None, Some(query)) => {
            let analysis = aggregator.analyze(query, condition)?;
            print_analysis(&analysis);
            Ok(())
        }
        (None, None) => {
            error!("Nothing to do: pass a query or --batch <csv>");
            Ok(())
        }
    }
}

fn print_analysis(analysis: &MarketAnalysis) {
    let rec = &analysis.recommendation;
    println!("{} ({})", analysis.query, analysis.condition);
    println!("  suggested:  {:.2}", rec.suggested);
    println!("  range:      {:.2} - {:.2}", rec.minimum, rec.maximum);
    println!("  confidence: {:.0}%", rec.confidence * 100.0);
    for line in &rec.reasoning {
        println!("  - {}", line);
    }
    for source in &analysis.sources {
        println!("  [{}] {:?}, {} prices", source.name, source.status, source.prices.len());
    }
}

fn run_batch(
    aggregator: &MarketAggregator,
    input: &Path,
    output: &Path,
    default_condition: Condition,
) -> Result<(), Box<dyn Error>> {
    let records = input_loader::load_records(input);
    if records.is_empty() {
        error!("No queries found in {:?}. Expected a 'query' column.", input);
        return Ok(());
    }

    let file_exists = output.exists();
    let file = OpenOptions::new().create(true).append(true).open(output)?;
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    if !file_exists {
        csv_writer.write_record([
            "query",
            "condition",
            "suggested",
            "minimum",
            "maximum",
            "confidence",
            "samples",
            "timestamp",
        ])?;
        csv_writer.flush()?;
    }

    let total = records.len();
    for (i, record) in records.iter().enumerate() {
        let condition = record.condition_or(default_condition);
        info!("Processing {} / {} : {} ({})", i + 1, total, record.query, condition);

        let analysis = match aggregator.analyze(&record.query, condition) {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("Failed to price '{}': {}", record.query, e);
                continue;
            }
        };

        let rec = &analysis.recommendation;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let row = vec![
            record.query.clone(),
            condition.label().to_string(),
            rec.suggested.to_string(),
            rec.minimum.to_string(),
            rec.maximum.to_string(),
            format!("{:.3}", rec.confidence),
            analysis.samples.len().to_string(),
            timestamp,
        ];
        if let Err(e) = csv_writer.write_record(&row) {
            error!("Failed to write CSV record for {}: {}", record.query, e);
        }
        csv_writer.flush()?;
    }

    info!("Batch completed. Priced {} queries into {:?}.", total, output);
    Ok(())
}
