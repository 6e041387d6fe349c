use anyhow::Result;
use chrono::NaiveDate;
use cvar_portfolio::market_data::{JsonPriceSource, PriceSource};
use cvar_portfolio::solver::HighsSolver;
use cvar_portfolio::{AssetUniverse, CvarError, CvarOptimizer, OptimizerConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[cfg(test)]
mod price_source_tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_prices(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("prices.json");
        fs::write(&path, json).unwrap();
        path
    }

    fn universe(names: &[&str]) -> AssetUniverse {
        AssetUniverse::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    const PRICES: &str = r#"{
        "dates": ["2021-12-30", "2022-01-03", "2022-01-04", "2022-01-05", "2022-01-06", "2022-01-07", "2022-01-10"],
        "prices": {
            "AAPL": [100.0, 101.0, 99.0, null, 102.0, 103.0, 101.5],
            "MSFT": [200.0, 198.0, 201.0, 203.0, 202.0, 199.0, 204.0],
            "TSLA": [50.0, 52.0, 49.0, 51.0, 53.0, 50.5, 52.5]
        }
    }"#;

    #[test]
    fn test_window_and_returns() -> Result<()> {
        let dir = TempDir::new()?;
        let source = JsonPriceSource::new(write_prices(&dir, PRICES));

        let series = source.load_returns(
            &universe(&["MSFT", "AAPL"]),
            date(2022, 1, 1),
            date(2022, 1, 10),
        )?;

        // Five dates in [2022-01-01, 2022-01-10) give four returns.
        assert_eq!(series.len(), 4);
        assert_eq!(series.assets(), &["MSFT".to_string(), "AAPL".to_string()]);
        let first = &series.observations()[0];
        assert_eq!(first.date, Some(date(2022, 1, 4)));
        assert!((first.returns[0].unwrap() - (201.0 / 198.0 - 1.0)).abs() < 1e-12);
        assert!((first.returns[1].unwrap() - (99.0 / 101.0 - 1.0)).abs() < 1e-12);

        // The AAPL gap on 01-05 removes two returns after cleaning.
        let clean = series.clean()?;
        assert_eq!(clean.observation_count(), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_ticker() -> Result<()> {
        let dir = TempDir::new()?;
        let source = JsonPriceSource::new(write_prices(&dir, PRICES));
        let result = source.load_returns(&universe(&["AAPL", "NVDA"]), date(2022, 1, 1), date(2023, 1, 1));
        assert!(matches!(result, Err(CvarError::DataUnavailable(_))));
        Ok(())
    }

    #[test]
    fn test_missing_and_malformed_files() -> Result<()> {
        let dir = TempDir::new()?;
        let missing = JsonPriceSource::new(dir.path().join("absent.json"));
        assert!(matches!(
            missing.load_returns(&universe(&["AAPL"]), date(2022, 1, 1), date(2023, 1, 1)),
            Err(CvarError::DataUnavailable(_))
        ));

        let garbage = JsonPriceSource::new(write_prices(&dir, "{ not json"));
        assert!(matches!(
            garbage.load_returns(&universe(&["AAPL"]), date(2022, 1, 1), date(2023, 1, 1)),
            Err(CvarError::DataUnavailable(_))
        ));

        let unsorted = JsonPriceSource::new(write_prices(
            &dir,
            r#"{ "dates": ["2022-01-04", "2022-01-03"], "prices": { "AAPL": [1.0, 2.0] } }"#,
        ));
        assert!(matches!(
            unsorted.load_returns(&universe(&["AAPL"]), date(2022, 1, 1), date(2023, 1, 1)),
            Err(CvarError::DataUnavailable(_))
        ));
        Ok(())
    }

    #[test]
    fn test_short_window_is_insufficient() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_prices(&dir, PRICES);
        let config = OptimizerConfig {
            tickers: vec!["AAPL".into(), "MSFT".into()],
            start_date: date(2022, 1, 3),
            end_date: date(2022, 1, 6),
            max_assets: 2,
            scenario_count: 10,
            seed: Some(1),
            price_file: path.display().to_string(),
            ..OptimizerConfig::default()
        };

        // Returns on 01-04 and 01-05; the AAPL gap leaves only one clean row.
        let result = CvarOptimizer::new(HighsSolver::default())
            .run(&config, &JsonPriceSource::new(&config.price_file));
        assert_eq!(result.unwrap_err(), CvarError::InsufficientData { available: 1 });
        Ok(())
    }

    #[test]
    fn test_end_to_end_from_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_prices(&dir, PRICES);
        let config = OptimizerConfig {
            tickers: vec!["AAPL".into(), "MSFT".into(), "TSLA".into()],
            start_date: date(2021, 1, 1),
            end_date: date(2023, 1, 1),
            max_assets: 2,
            scenario_count: 300,
            seed: Some(17),
            price_file: path.display().to_string(),
            ..OptimizerConfig::default()
        };

        let report = CvarOptimizer::new(HighsSolver::new(config.solver.clone()))
            .run(&config, &JsonPriceSource::new(&config.price_file))?;

        assert!((report.allocation.total_weight() - 1.0).abs() < 1e-5);
        assert!(report.allocation.selected_assets.len() <= 2);
        assert!((report.diagnostics.cvar - report.allocation.cvar).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_config_round_trip_through_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        let mut config = OptimizerConfig::default();
        config.max_assets = 2;
        config.seed = Some(5);
        fs::write(&path, serde_json::to_string_pretty(&config)?)?;

        let loaded = OptimizerConfig::load_from_file(&path)?;
        assert_eq!(loaded.max_assets, 2);
        assert_eq!(loaded.seed, Some(5));
        assert_eq!(loaded.tickers, config.tickers);

        let defaulted = OptimizerConfig::load_from_file(dir.path().join("missing.json"))?;
        assert_eq!(defaulted.max_assets, 3);
        Ok(())
    }
}
