//! Configuration validation.
//!
//! Validates every config field before a run. Keys are optional; a present key
//! must parse and satisfy the same constraints as [`StrategyParams::validate`].

use chrono_tz::Tz;

use crate::domain::error::LadderError;
use crate::domain::price_series::{YearMonth, parse_timestamp};
use crate::domain::signal::SignalThresholds;
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), LadderError> {
    validate_leverage(config)?;
    for key in [
        "net_target_return",
        "maker_fee",
        "initial_margin",
        "add_margin",
        "maintenance_margin_ratio",
    ] {
        validate_number(config, "strategy", key)?;
    }
    validate_drop_fractions(config)?;
    validate_bool(config, "strategy", "fee_inclusive")?;
    read_strategy_params(config)?.validate()
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), LadderError> {
    if let Some(raw) = config.get_string("signals", "thresholds") {
        SignalThresholds::parse(&raw)?;
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), LadderError> {
    if let Some(raw) = config.get_string("backtest", "month") {
        YearMonth::parse(&raw)?;
    }
    if let Some(raw) = config.get_string("backtest", "start_time") {
        if parse_timestamp(&raw).is_none() {
            return Err(LadderError::invalid(
                "backtest",
                "start_time",
                format!("'{raw}' is not a timestamp"),
            ));
        }
    }
    validate_timezone(config, "backtest")?;
    validate_timezone(config, "report")?;
    validate_bool(config, "backtest", "parallel")?;
    Ok(())
}

/// Strategy parameters from `[strategy]`, falling back to defaults per key.
/// Not validated; callers run [`StrategyParams::validate`].
pub fn read_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, LadderError> {
    let d = StrategyParams::default();
    let leverage = config.get_int("strategy", "leverage", d.leverage as i64);
    let leverage = u32::try_from(leverage).map_err(|_| {
        LadderError::invalid("strategy", "leverage", "leverage must be a positive integer")
    })?;
    let drop_fractions = match config.get_double_list("strategy", "drop_fractions") {
        None => d.drop_fractions.clone(),
        Some(Ok(list)) => list,
        Some(Err(item)) => return Err(bad_list_item(&item)),
    };
    Ok(StrategyParams {
        leverage,
        net_target_return: config.get_double("strategy", "net_target_return", d.net_target_return),
        maker_fee: config.get_double("strategy", "maker_fee", d.maker_fee),
        initial_margin: config.get_double("strategy", "initial_margin", d.initial_margin),
        add_margin: config.get_double("strategy", "add_margin", d.add_margin),
        drop_fractions,
        maintenance_margin_ratio: config.get_double(
            "strategy",
            "maintenance_margin_ratio",
            d.maintenance_margin_ratio,
        ),
        fee_inclusive: config.get_bool("strategy", "fee_inclusive", d.fee_inclusive),
    })
}

pub fn read_timezone(config: &dyn ConfigPort, section: &str, default: Tz) -> Result<Tz, LadderError> {
    match config.get_string(section, "timezone") {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<Tz>().map_err(|_| {
            LadderError::invalid(section, "timezone", format!("unknown timezone '{raw}'"))
        }),
    }
}

fn bad_list_item(item: &str) -> LadderError {
    LadderError::invalid(
        "strategy",
        "drop_fractions",
        format!("'{item}' is not a number"),
    )
}

fn validate_leverage(config: &dyn ConfigPort) -> Result<(), LadderError> {
    let Some(raw) = config.get_string("strategy", "leverage") else {
        return Ok(());
    };
    match raw.trim().parse::<u32>() {
        Ok(v) if v >= 1 => Ok(()),
        _ => Err(LadderError::invalid(
            "strategy",
            "leverage",
            "leverage must be a positive integer",
        )),
    }
}

fn validate_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LadderError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<f64>().is_err() => Err(LadderError::invalid(
            section,
            key,
            format!("'{raw}' is not a number"),
        )),
        _ => Ok(()),
    }
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LadderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(());
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "false" | "no" | "0" => Ok(()),
        _ => Err(LadderError::invalid(
            section,
            key,
            format!("'{raw}' is not a boolean"),
        )),
    }
}

fn validate_drop_fractions(config: &dyn ConfigPort) -> Result<(), LadderError> {
    match config.get_double_list("strategy", "drop_fractions") {
        Some(Err(item)) => Err(bad_list_item(&item)),
        _ => Ok(()),
    }
}

fn validate_timezone(config: &dyn ConfigPort, section: &str) -> Result<(), LadderError> {
    read_timezone(config, section, Tz::UTC).map(|_| ())
}
