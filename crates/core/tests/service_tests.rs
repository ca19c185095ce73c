// ═══════════════════════════════════════════════════════════════════
// Service Tests: ValuationService, SeriesImputer, ReshapeService,
// PreprocessingService, AssemblyService, RecordService
// ═══════════════════════════════════════════════════════════════════

use approx::{assert_abs_diff_eq, assert_relative_eq};
use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use portfolio_returns_core::errors::CoreError;
use portfolio_returns_core::models::asset::{AssetMetadata, DailyMetricPoint};
use portfolio_returns_core::models::price::{PriceMatrix, PricePoint, PriceSeries};
use portfolio_returns_core::models::settings::{EngineConfig, RebalancePolicy};
use portfolio_returns_core::models::strategy::{PortfolioCatalog, StrategyDefinition};
use portfolio_returns_core::models::table::{LongRow, LongTable, WideTable};
use portfolio_returns_core::models::weights::{AssetClass, AssetWeights, StrategyWeights};
use portfolio_returns_core::services::assembly_service::AssemblyService;
use portfolio_returns_core::services::imputation_service::SeriesImputer;
use portfolio_returns_core::services::preprocessing_service::{
    merge_series, rates_to_returns, PreprocessingService,
};
use portfolio_returns_core::services::record_service::RecordService;
use portfolio_returns_core::services::reshape_service::ReshapeService;
use portfolio_returns_core::services::valuation_service::{
    annual_roi_from_prices, annualize_roi, annualized_volatility, last_24h_change,
    ValuationService,
};

// ═══════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn day(offset: usize) -> NaiveDate {
    d(2021, 1, 1) + Days::new(offset as u64)
}

fn series(ticker: &str, start: usize, prices: &[f64]) -> PriceSeries {
    let points = prices
        .iter()
        .enumerate()
        .map(|(i, p)| PricePoint::new(day(start + i), *p))
        .collect();
    PriceSeries::new(ticker, points).unwrap()
}

fn matrix(columns: &[(&str, &[f64])]) -> PriceMatrix {
    let all: Vec<PriceSeries> = columns.iter().map(|(t, p)| series(t, 0, p)).collect();
    PriceMatrix::align(&all).unwrap()
}

fn weights(pairs: &[(&str, f64)]) -> AssetWeights {
    AssetWeights::from_pairs(pairs.iter().copied()).unwrap()
}

/// Reference matrix with a trending column and a weekly-periodic column.
fn reference(days: usize) -> PriceMatrix {
    let btc: Vec<f64> = (0..days).map(|i| 100.0 + i as f64).collect();
    let eth: Vec<f64> = (0..days).map(|i| 50.0 + (i % 7) as f64).collect();
    matrix(&[("btc", &btc), ("eth", &eth)])
}

// ═══════════════════════════════════════════════════════════════════
// ValuationService: simulate
// ═══════════════════════════════════════════════════════════════════

mod valuation {
    use super::*;

    #[test]
    fn buy_and_hold() {
        let prices = matrix(&[("a", &[10.0, 10.0, 10.2]), ("b", &[5.0, 5.0, 5.0])]);
        let result = ValuationService::new()
            .simulate(&weights(&[("a", 0.5), ("b", 0.5)]), &prices, 0)
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_relative_eq!(result.values[0], 100.0);
        assert_relative_eq!(result.values[1], 100.0);
        assert_relative_eq!(result.values[2], 101.0, max_relative = 1e-12);
    }

    #[test]
    fn daily_rebalance() {
        let prices = matrix(&[("a", &[1.0, 2.0, 1.0]), ("b", &[1.0, 1.0, 1.0])]);
        let result = ValuationService::new()
            .simulate(&weights(&[("a", 0.5), ("b", 0.5)]), &prices, 1)
            .unwrap();

        assert_eq!(result.values, vec![100.0, 150.0, 112.5]);
    }

    #[test]
    fn same_prices_without_rebalance_return_to_start() {
        let prices = matrix(&[("a", &[1.0, 2.0, 1.0]), ("b", &[1.0, 1.0, 1.0])]);
        let result = ValuationService::new()
            .simulate(&weights(&[("a", 0.5), ("b", 0.5)]), &prices, 0)
            .unwrap();

        assert_eq!(result.values, vec![100.0, 150.0, 100.0]);
    }

    #[test]
    fn period_longer_than_window_is_buy_and_hold() {
        let prices = matrix(&[("a", &[1.0, 2.0, 1.0]), ("b", &[1.0, 1.0, 1.0])]);
        let service = ValuationService::new();
        let w = weights(&[("a", 0.5), ("b", 0.5)]);

        let held = service.simulate(&w, &prices, 0).unwrap();
        let long_period = service.simulate(&w, &prices, 90).unwrap();
        let negative = service.simulate(&w, &prices, -5).unwrap();
        assert_eq!(held, long_period);
        assert_eq!(held, negative);
    }

    #[test]
    fn first_value_is_initial_investment_and_roi_starts_at_zero() {
        let prices = matrix(&[("a", &[3.0, 4.0, 5.0])]);
        let result = ValuationService::new()
            .simulate(&weights(&[("a", 1.0)]), &prices, 1)
            .unwrap();

        assert_eq!(result.values[0], 100.0);
        assert_eq!(result.roi()[0], 0.0);
        assert_eq!(result.dates, prices.dates());
    }

    #[test]
    fn zero_price_aborts() {
        let prices = matrix(&[("a", &[1.0, 0.0, 1.0]), ("b", &[1.0, 1.0, 1.0])]);
        let err = ValuationService::new()
            .simulate(&weights(&[("a", 0.5), ("b", 0.5)]), &prices, 1)
            .unwrap_err();

        match err {
            CoreError::ZeroPrice { ticker, date } => {
                assert_eq!(ticker, "a");
                assert_eq!(date, day(1));
            }
            other => panic!("expected ZeroPrice, got {other:?}"),
        }
    }

    #[test]
    fn unweighted_zero_price_is_ignored() {
        let prices = matrix(&[("a", &[1.0, 1.0]), ("b", &[1.0, 0.0])]);
        let result = ValuationService::new()
            .simulate(&weights(&[("a", 1.0)]), &prices, 1)
            .unwrap();
        assert_eq!(result.values, vec![100.0, 100.0]);
    }

    #[test]
    fn unknown_asset() {
        let prices = matrix(&[("a", &[1.0, 1.0])]);
        let err = ValuationService::new()
            .simulate(&weights(&[("zzz", 1.0)]), &prices, 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAsset(ref t) if t == "zzz"));
    }

    #[test]
    fn empty_matrix() {
        let err = ValuationService::new()
            .simulate(&weights(&[("a", 1.0)]), &PriceMatrix::default(), 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientData(_)));
    }

    #[test]
    fn all_dates_carried() {
        let prices = matrix(&[("a", &[1.0; 10])]);
        let result = ValuationService::new()
            .simulate(&weights(&[("a", 1.0)]), &prices, 3)
            .unwrap();
        assert_eq!(result.len(), prices.len());
        assert!(result.values.iter().all(|v| *v == 100.0));
    }
}

// ═══════════════════════════════════════════════════════════════════
// ValuationService: analytics helpers
// ═══════════════════════════════════════════════════════════════════

mod analytics {
    use super::*;

    #[test]
    fn annualize_single_day() {
        let apy = annualize_roi(10.0, 1).unwrap();
        assert_relative_eq!(apy, (1.1f64.powi(365) - 1.0) * 100.0, max_relative = 1e-9);
    }

    #[test]
    fn annualize_full_year_is_identity() {
        assert_relative_eq!(annualize_roi(12.0, 365).unwrap(), 12.0, max_relative = 1e-12);
    }

    #[test]
    fn annualize_zero_roi() {
        assert_abs_diff_eq!(annualize_roi(0.0, 10).unwrap(), 0.0);
    }

    #[test]
    fn annualize_over_zero_days_fails() {
        assert!(matches!(
            annualize_roi(5.0, 0),
            Err(CoreError::InsufficientData(_))
        ));
    }

    #[test]
    fn volatility_of_constant_series_is_zero() {
        let s = series("a", 0, &[5.0; 30]);
        assert_abs_diff_eq!(annualized_volatility(&s).unwrap(), 0.0);
    }

    #[test]
    fn volatility_of_single_point_is_zero() {
        let s = series("a", 0, &[5.0]);
        assert_eq!(annualized_volatility(&s).unwrap(), 0.0);
    }

    #[test]
    fn volatility_uses_population_std_of_log_returns() {
        let s = series("a", 0, &[1.0, 0.1f64.exp(), 1.0]);
        let expected = 0.1 * 365f64.sqrt();
        assert_relative_eq!(annualized_volatility(&s).unwrap(), expected, max_relative = 1e-9);
    }

    #[test]
    fn volatility_rejects_zero_price() {
        let s = series("a", 0, &[1.0, 0.0]);
        assert!(matches!(
            annualized_volatility(&s),
            Err(CoreError::ZeroPrice { .. })
        ));
    }

    #[test]
    fn last_24h_change_percent() {
        let s = series("a", 0, &[90.0, 100.0, 110.0]);
        assert_relative_eq!(last_24h_change(&s).unwrap(), 10.0, max_relative = 1e-12);
    }

    #[test]
    fn last_24h_change_single_point_is_zero() {
        let s = series("a", 0, &[100.0]);
        assert_eq!(last_24h_change(&s).unwrap(), 0.0);
    }

    #[test]
    fn annual_roi_from_prices_uses_observation_count() {
        let s = series("a", 0, &[100.0, 110.0]);
        let expected = (1.1f64.powf(365.0 / 2.0) - 1.0) * 100.0;
        assert_relative_eq!(annual_roi_from_prices(&s).unwrap(), expected, max_relative = 1e-9);
    }

    #[test]
    fn annual_roi_from_empty_series_fails() {
        let s = PriceSeries::new("a", vec![]).unwrap();
        assert!(matches!(
            annual_roi_from_prices(&s),
            Err(CoreError::InsufficientData(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// SeriesImputer
// ═══════════════════════════════════════════════════════════════════

mod imputer {
    use super::*;

    /// Target that is an exact linear function of the periodic reference column.
    fn periodic_target(start: usize, end: usize) -> PriceSeries {
        let values: Vec<f64> = (start..end).map(|i| 10.0 + 3.0 * (i % 7) as f64).collect();
        series("aave", start, &values)
    }

    #[test]
    fn extends_series_back_to_start() {
        let x = reference(300);
        let y = periodic_target(100, 300);
        let out = SeriesImputer::default()
            .impute(&x, &y, day(10), d(2030, 1, 1))
            .unwrap();

        assert_eq!(out.imputed_days, 90);
        assert_eq!(out.series.len(), y.len() + 90);
        assert_eq!(out.series.first_date(), Some(day(10)));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn original_points_are_untouched() {
        let x = reference(300);
        let y = periodic_target(100, 300);
        let out = SeriesImputer::default()
            .impute(&x, &y, day(10), d(2030, 1, 1))
            .unwrap();

        let tail = &out.series.points()[out.imputed_days..];
        assert_eq!(tail, y.points());
    }

    #[test]
    fn predictions_follow_the_fitted_relation() {
        let x = reference(300);
        let y = periodic_target(100, 300);
        let out = SeriesImputer::default()
            .impute(&x, &y, day(10), d(2030, 1, 1))
            .unwrap();

        for (offset, point) in out.series.points()[..out.imputed_days].iter().enumerate() {
            let i = 10 + offset;
            assert_eq!(point.date, day(i));
            let expected = 10.0 + 3.0 * (i % 7) as f64;
            assert_abs_diff_eq!(point.price, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn predictions_are_clipped_to_two_sigma() {
        let x = reference(300);
        let labels: Vec<f64> = (100..300).map(|i| 2.0 * (100.0 + i as f64)).collect();
        let y = series("aave", 100, &labels);

        let n = labels.len() as f64;
        let mean = labels.iter().sum::<f64>() / n;
        let std = (labels.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let (low, high) = (mean - 2.0 * std, mean + 2.0 * std);

        let out = SeriesImputer::default()
            .impute(&x, &y, day(0), d(2030, 1, 1))
            .unwrap();
        let imputed = &out.series.points()[..out.imputed_days];

        assert_eq!(imputed.len(), 100);
        assert!(imputed.iter().all(|p| p.price >= low - 1e-9 && p.price <= high + 1e-9));
        assert_relative_eq!(imputed[0].price, low, max_relative = 1e-9);
    }

    #[test]
    fn too_few_training_rows_skips() {
        let x = reference(150);
        let y = periodic_target(100, 150);
        let out = SeriesImputer::default()
            .impute(&x, &y, day(0), d(2030, 1, 1))
            .unwrap();

        assert!(!out.is_imputed());
        assert_eq!(out.series, y);
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(out.warnings[0], CoreError::InsufficientData(_)));
    }

    #[test]
    fn minimum_is_configurable() {
        let x = reference(150);
        let y = periodic_target(100, 150);
        let imputer = SeriesImputer::new(20);
        assert_eq!(imputer.min_training_rows(), 20);

        let out = imputer.impute(&x, &y, day(0), d(2030, 1, 1)).unwrap();
        assert_eq!(out.imputed_days, 100);
    }

    #[test]
    fn training_rows_stop_at_training_end() {
        let x = reference(300);
        let y = periodic_target(100, 300);
        // [day 100, day 150) leaves 50 rows, below the default minimum
        let out = SeriesImputer::default()
            .impute(&x, &y, day(10), day(150))
            .unwrap();
        assert!(!out.is_imputed());
    }

    #[test]
    fn start_before_reference_is_clamped() {
        let x = reference(300);
        let y = periodic_target(100, 300);
        let out = SeriesImputer::default()
            .impute(&x, &y, d(2018, 1, 1), d(2030, 1, 1))
            .unwrap();

        assert_eq!(out.series.first_date(), Some(day(0)));
        assert_eq!(out.imputed_days, 100);
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, CoreError::DateRange(_))));
    }

    #[test]
    fn training_end_before_target_is_clamped() {
        let x = reference(300);
        let y = periodic_target(100, 300);
        let out = SeriesImputer::default()
            .impute(&x, &y, day(10), d(2020, 1, 1))
            .unwrap();

        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, CoreError::DateRange(_))));
        // clamped to the last target date, which excludes only that one row
        assert_eq!(out.imputed_days, 90);
    }

    #[test]
    fn target_already_covering_start_is_unchanged() {
        let x = reference(300);
        let y = periodic_target(5, 300);
        let out = SeriesImputer::default()
            .impute(&x, &y, day(10), d(2030, 1, 1))
            .unwrap();

        assert!(!out.is_imputed());
        assert_eq!(out.series, y);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn empty_target_fails() {
        let x = reference(10);
        let y = PriceSeries::new("aave", vec![]).unwrap();
        let err = SeriesImputer::default()
            .impute(&x, &y, day(0), d(2030, 1, 1))
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientData(_)));
    }
}

// ═══════════════════════════════════════════════════════════════════
// ReshapeService
// ═══════════════════════════════════════════════════════════════════

mod reshape {
    use super::*;

    fn wide() -> WideTable {
        let columns = BTreeMap::from([
            ("eth".to_string(), vec![Some(10.0), None]),
            ("btc".to_string(), vec![Some(1.0), Some(2.0)]),
        ]);
        WideTable::new(vec![day(0), day(1)], columns).unwrap()
    }

    fn row(offset: usize, entity: &str, value: Option<f64>) -> LongRow {
        LongRow {
            timestamp: day(offset),
            entity: entity.to_string(),
            value,
        }
    }

    #[test]
    fn to_long_on_deserialized_table() {
        let json = r#"{"index":["2021-01-01","2021-01-02"],"columns":{"btc":[1.0,null]}}"#;
        let table: WideTable = serde_json::from_str(json).unwrap();
        let long = ReshapeService::new().to_long(&table, "asset_ticker", "closing_price");
        assert_eq!(long.len(), 2);
        assert_eq!(long.rows[1].value, None);

        let ragged = r#"{"index":["2021-01-01","2021-01-02"],"columns":{"btc":[1.0]}}"#;
        assert!(serde_json::from_str::<WideTable>(ragged).is_err());
    }

    #[test]
    fn to_long_sorts_by_timestamp_then_entity() {
        let long = ReshapeService::new().to_long(&wide(), "asset_ticker", "closing_price");

        assert_eq!(long.entity_column, "asset_ticker");
        assert_eq!(long.value_column, "closing_price");
        assert_eq!(
            long.rows,
            vec![
                row(0, "btc", Some(1.0)),
                row(0, "eth", Some(10.0)),
                row(1, "btc", Some(2.0)),
                row(1, "eth", None),
            ]
        );
    }

    #[test]
    fn round_trip() {
        let service = ReshapeService::new();
        let original = wide();
        let long = service.to_long(&original, "asset_ticker", "closing_price");
        let back = service.to_wide(&long).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn to_wide_fills_missing_pairs_with_null() {
        let long = LongTable {
            entity_column: "asset_ticker".into(),
            value_column: "market_cap".into(),
            rows: vec![row(1, "eth", Some(3.0)), row(0, "btc", Some(1.0))],
        };
        let wide = ReshapeService::new().to_wide(&long).unwrap();

        assert_eq!(wide.index(), &[day(0), day(1)]);
        assert_eq!(wide.column("btc"), Some(&[Some(1.0), None][..]));
        assert_eq!(wide.column("eth"), Some(&[None, Some(3.0)][..]));
    }

    #[test]
    fn to_wide_rejects_duplicates() {
        let long = LongTable {
            entity_column: "asset_ticker".into(),
            value_column: "closing_price".into(),
            rows: vec![row(0, "btc", Some(1.0)), row(0, "btc", Some(2.0))],
        };
        let err = ReshapeService::new().to_wide(&long).unwrap_err();
        match err {
            CoreError::DuplicateKey { timestamp, entity } => {
                assert_eq!(timestamp, day(0));
                assert_eq!(entity, "btc");
            }
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn empty_tables() {
        let service = ReshapeService::new();
        let long = service.to_long(&WideTable::default(), "e", "v");
        assert!(long.is_empty());
        let wide = service.to_wide(&long).unwrap();
        assert!(wide.index().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// PreprocessingService
// ═══════════════════════════════════════════════════════════════════

mod preprocessing {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            start_date: day(0),
            training_end_date: d(2030, 1, 1),
            min_training_rows: 5,
            rolling_window: 1,
            reference_tickers: vec!["btc".into(), "eth".into()],
            ..EngineConfig::default()
        }
    }

    fn metadata() -> Vec<AssetMetadata> {
        vec![
            AssetMetadata::coin(1, "btc", "Bitcoin"),
            AssetMetadata::coin(2, "eth", "Ethereum"),
            AssetMetadata::coin(3, "doge", "Dogecoin"),
            AssetMetadata::lending_protocol(4, "compound", "Compound"),
        ]
    }

    fn raw_series() -> Vec<PriceSeries> {
        let x = reference(40);
        let rates: Vec<f64> = (10..40).map(|i| 5.0 + 0.5 * (i % 7) as f64).collect();
        vec![
            x.series("btc").unwrap(),
            x.series("eth").unwrap(),
            series("doge", 20, &[0.1; 20]),
            series("compound", 10, &rates),
        ]
    }

    #[test]
    fn rates_to_returns_compounds_daily() {
        let rates = matrix(&[("aave", &[36.5, 36.5, 36.5])]);
        let index = rates_to_returns(&rates).unwrap();
        let daily = 1.365f64.powf(1.0 / 365.0);
        let col = index.column("aave").unwrap();

        assert_eq!(col[0], 1.0);
        assert_relative_eq!(col[1], daily, max_relative = 1e-12);
        assert_relative_eq!(col[2], daily * daily, max_relative = 1e-12);
    }

    #[test]
    fn rates_to_returns_rejects_total_loss_rate() {
        let rates = matrix(&[("aave", &[5.0, -100.0])]);
        assert!(matches!(
            rates_to_returns(&rates),
            Err(CoreError::InvalidSeries(_))
        ));
    }

    #[test]
    fn merge_series_aligns_and_smooths() {
        let merged = merge_series(
            &[series("a", 0, &[1.0, 3.0, 5.0]), series("b", 1, &[2.0, 4.0])],
            2,
        )
        .unwrap();
        assert_eq!(merged.dates(), &[day(1), day(2)]);
        assert_eq!(merged.column("a"), Some(&[3.0, 4.0][..]));
        assert_eq!(merged.column("b"), Some(&[2.0, 3.0][..]));
    }

    #[test]
    fn builds_aligned_matrix() {
        let prices = PreprocessingService::new(SeriesImputer::new(5))
            .build_price_matrix(&config(), &metadata(), &raw_series())
            .unwrap();

        let tickers: Vec<&str> = prices.tickers().collect();
        assert_eq!(tickers, vec!["btc", "comp", "eth"]);
        assert_eq!(prices.len(), 40);
        assert_eq!(prices.first_date(), Some(day(0)));
        assert_eq!(prices.column("comp").map(|c| c[0]), Some(1.0));
        assert!(prices.column("comp").unwrap().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn young_coins_are_dropped() {
        let prices = PreprocessingService::default()
            .build_price_matrix(&config(), &metadata(), &raw_series())
            .unwrap();
        assert!(!prices.contains("doge"));
    }

    #[test]
    fn lending_without_enough_history_shortens_matrix() {
        let config = EngineConfig {
            min_training_rows: 1000,
            ..config()
        };
        let prices = PreprocessingService::new(SeriesImputer::new(1000))
            .build_price_matrix(&config, &metadata(), &raw_series())
            .unwrap();
        assert_eq!(prices.first_date(), Some(day(10)));
        assert_eq!(prices.len(), 30);
    }

    #[test]
    fn no_coins_is_insufficient() {
        let err = PreprocessingService::default()
            .build_price_matrix(&config(), &metadata(), &[series("doge", 20, &[0.1; 20])])
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientData(_)));
    }

    #[test]
    fn missing_reference_ticker_fails() {
        let config = EngineConfig {
            reference_tickers: vec!["usdt".into()],
            ..config()
        };
        let err = PreprocessingService::default()
            .build_price_matrix(&config, &metadata(), &raw_series())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAsset(_)));
    }

    #[test]
    fn series_without_metadata_are_ignored() {
        let mut raw = raw_series();
        raw.push(series("mystery", 0, &[1.0; 40]));
        let prices = PreprocessingService::default()
            .build_price_matrix(&config(), &metadata(), &raw)
            .unwrap();
        assert!(!prices.contains("mystery"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// AssemblyService
// ═══════════════════════════════════════════════════════════════════

mod assembly {
    use super::*;

    fn catalog() -> PortfolioCatalog {
        PortfolioCatalog {
            asset_classes: BTreeMap::from([
                (AssetClass::LendingProtocols, weights(&[("aave", 1.0)])),
                (AssetClass::BtcEth, weights(&[("btc", 0.5), ("eth", 0.5)])),
                (AssetClass::AltCoins, weights(&[("xrp", 1.0)])),
            ]),
            strategies: vec![
                StrategyDefinition::new(
                    "save",
                    "Save",
                    "Lending only.",
                    StrategyWeights::from_pairs([
                        (AssetClass::LendingProtocols, 1.0),
                        (AssetClass::BtcEth, 0.0),
                        (AssetClass::AltCoins, 0.0),
                    ])
                    .unwrap(),
                ),
                StrategyDefinition::new(
                    "aggr",
                    "Aggressive",
                    "Everything.",
                    StrategyWeights::from_pairs([
                        (AssetClass::LendingProtocols, 0.2),
                        (AssetClass::BtcEth, 0.5),
                        (AssetClass::AltCoins, 0.3),
                    ])
                    .unwrap(),
                ),
            ],
        }
    }

    fn metadata() -> Vec<AssetMetadata> {
        vec![
            AssetMetadata::lending_protocol(1, "aave", "Aave"),
            AssetMetadata::coin(2, "btc", "Bitcoin"),
            AssetMetadata::coin(3, "eth", "Ethereum"),
            AssetMetadata::coin(4, "xrp", "XRP"),
        ]
    }

    fn prices() -> PriceMatrix {
        matrix(&[
            ("aave", &[1.0, 1.001, 1.002, 1.003]),
            ("btc", &[100.0, 110.0, 105.0, 120.0]),
            ("eth", &[10.0, 10.0, 12.0, 11.0]),
            ("xrp", &[1.0, 0.9, 0.8, 1.1]),
        ])
    }

    #[test]
    fn class_values_are_keyed_by_class() {
        let values = AssemblyService::new()
            .class_values(&catalog(), &prices(), &RebalancePolicy::default())
            .unwrap();

        let keys: Vec<&str> = values.tickers().collect();
        assert_eq!(keys, vec!["altCoins", "btcEth", "lendingProtocols"]);
        assert_eq!(values.len(), 4);
        assert!(values.columns().values().all(|c| c[0] == 100.0));
        assert_relative_eq!(values.column("altCoins").unwrap()[3], 110.0, max_relative = 1e-12);
    }

    #[test]
    fn zero_weight_classes_are_omitted() {
        let doc = AssemblyService::new()
            .assemble(&catalog(), &prices(), &metadata(), &RebalancePolicy::default())
            .unwrap();

        let save = doc.get("save").unwrap();
        assert_eq!(
            save.asset_classes.keys().copied().collect::<Vec<_>>(),
            vec![AssetClass::LendingProtocols]
        );
        assert_eq!(doc.get("aggr").unwrap().asset_classes.len(), 3);
    }

    #[test]
    fn single_class_strategy_tracks_its_basket() {
        let policy = RebalancePolicy::default();
        let service = AssemblyService::new();
        let doc = service
            .assemble(&catalog(), &prices(), &metadata(), &policy)
            .unwrap();
        let lending = service.class_values(&catalog(), &prices(), &policy).unwrap();

        let save = doc.get("save").unwrap();
        let last_roi = save.historical_roi.values().last().copied().unwrap();
        let expected = lending.column("lendingProtocols").unwrap()[3] - 100.0;
        assert_relative_eq!(last_roi, expected, max_relative = 1e-12);
        assert_relative_eq!(
            save.annual_roi,
            annualize_roi(expected, 4).unwrap(),
            max_relative = 1e-12
        );
        assert!(save.annual_roi_range[0] <= save.annual_roi);
        assert!(save.annual_roi_range[1] >= save.annual_roi);
    }

    #[test]
    fn percentages() {
        let doc = AssemblyService::new()
            .assemble(&catalog(), &prices(), &metadata(), &RebalancePolicy::default())
            .unwrap();
        let aggr = doc.get("aggr").unwrap();

        let btc_eth = &aggr.asset_classes[&AssetClass::BtcEth];
        assert_relative_eq!(btc_eth.portfolio_percentage, 50.0);
        assert_eq!(btc_eth.assets.len(), 2);
        assert!(btc_eth.assets.iter().all(|a| a.portfolio_percentage == 50.0));

        let btc = &btc_eth.assets[0];
        assert_eq!(btc.ticker, "btc");
        assert_eq!(btc.fullname, "Bitcoin");
        assert_eq!(btc.asset_id, 2);
        assert_eq!(btc.last_price, 120.0);
        assert_relative_eq!(
            btc.last_24h_percent_change,
            (120.0 - 105.0) / 105.0 * 100.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn json_field_names() {
        let doc = AssemblyService::new()
            .assemble(&catalog(), &prices(), &metadata(), &RebalancePolicy::default())
            .unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        let save = &json["save"];

        assert_eq!(save["fullname"], "Save");
        assert_eq!(save["description"], "Lending only.");
        assert!(save["annualRoi"].is_number());
        assert_eq!(save["annualRoiRange"].as_array().map(Vec::len), Some(2));
        assert_eq!(save["lendingProtocols"]["portfolioPercentage"], 100.0);
        assert!(save.get("btcEth").is_none());
        assert!(save.get("altCoins").is_none());

        let asset = &save["lendingProtocols"]["assets"][0];
        for key in [
            "ticker",
            "fullname",
            "assetId",
            "annualRoi",
            "lastPrice",
            "last24hPercentChange",
            "portfolioPercentage",
        ] {
            assert!(asset.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn historical_roi_keys_are_timestamps() {
        let doc = AssemblyService::new()
            .assemble(&catalog(), &prices(), &metadata(), &RebalancePolicy::default())
            .unwrap();
        let roi = &doc.get("aggr").unwrap().historical_roi;

        assert_eq!(roi.len(), 4);
        assert_eq!(roi.get("2021-01-01 00:00:00"), Some(&0.0));
        assert!(roi.contains_key("2021-01-04 00:00:00"));
    }

    #[test]
    fn constant_prices_give_zero_roi_and_band() {
        let flat = matrix(&[
            ("aave", &[1.0; 5]),
            ("btc", &[1.0; 5]),
            ("eth", &[1.0; 5]),
            ("xrp", &[1.0; 5]),
        ]);
        let doc = AssemblyService::new()
            .assemble(&catalog(), &flat, &metadata(), &RebalancePolicy::default())
            .unwrap();
        let aggr = doc.get("aggr").unwrap();

        assert_abs_diff_eq!(aggr.annual_roi, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(aggr.annual_roi_range[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(aggr.annual_roi_range[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_metadata_fails() {
        let mut meta = metadata();
        meta.retain(|m| m.ticker != "xrp");
        let err = AssemblyService::new()
            .assemble(&catalog(), &prices(), &meta, &RebalancePolicy::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAsset(_)));
    }

    #[test]
    fn missing_price_column_fails() {
        let partial = matrix(&[("btc", &[1.0, 2.0]), ("eth", &[1.0, 2.0])]);
        let err = AssemblyService::new()
            .assemble(&catalog(), &partial, &metadata(), &RebalancePolicy::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAsset(_)));
    }
}

// ═══════════════════════════════════════════════════════════════════
// RecordService
// ═══════════════════════════════════════════════════════════════════

mod records {
    use super::*;

    #[test]
    fn price_records_per_date_and_ticker() {
        let prices = matrix(&[("btc", &[1.0, 2.0]), ("eth", &[3.0, 4.0]), ("xyz", &[5.0, 6.0])]);
        let meta = vec![
            AssetMetadata::coin(1, "btc", "Bitcoin"),
            AssetMetadata::coin(2, "eth", "Ethereum"),
        ];
        let records = RecordService::new().price_records(&prices, &meta, "1d");

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].asset_id, 1);
        assert_eq!(records[0].asset_ticker, "btc");
        assert_eq!(records[0].tick_size, "1d");
        assert_eq!(records[0].timestamp, day(0));
        assert_eq!(records[0].closing_price, Some(1.0));
        assert_eq!(records[3].asset_ticker, "eth");
        assert_eq!(records[3].closing_price, Some(4.0));
        assert!(records.iter().all(|r| r.asset_ticker != "xyz"));
    }

    #[test]
    fn daily_metrics_use_union_of_dates() {
        let metrics = BTreeMap::from([
            (
                "btc".to_string(),
                vec![
                    DailyMetricPoint {
                        date: day(0),
                        market_cap: Some(100.0),
                        trading_volume_24h: Some(10.0),
                    },
                    DailyMetricPoint {
                        date: day(1),
                        market_cap: Some(110.0),
                        trading_volume_24h: None,
                    },
                ],
            ),
            (
                "eth".to_string(),
                vec![DailyMetricPoint {
                    date: day(1),
                    market_cap: Some(50.0),
                    trading_volume_24h: Some(5.0),
                }],
            ),
        ]);
        let meta = vec![
            AssetMetadata::coin(1, "btc", "Bitcoin"),
            AssetMetadata::coin(2, "eth", "Ethereum"),
        ];
        let records = RecordService::new()
            .daily_metric_records(&metrics, &meta, "1d")
            .unwrap();

        assert_eq!(records.len(), 4);
        let by_key: HashMap<(NaiveDate, &str), (Option<f64>, Option<f64>)> = records
            .iter()
            .map(|r| {
                (
                    (r.timestamp, r.asset_ticker.as_str()),
                    (r.market_cap, r.trading_volume_24h),
                )
            })
            .collect();
        assert_eq!(by_key[&(day(0), "btc")], (Some(100.0), Some(10.0)));
        assert_eq!(by_key[&(day(1), "btc")], (Some(110.0), None));
        assert_eq!(by_key[&(day(0), "eth")], (None, None));
        assert_eq!(by_key[&(day(1), "eth")], (Some(50.0), Some(5.0)));
    }

    #[test]
    fn no_metrics_no_records() {
        let records = RecordService::new()
            .daily_metric_records(&BTreeMap::new(), &[], "1d")
            .unwrap();
        assert!(records.is_empty());
    }
}
