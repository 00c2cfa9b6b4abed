//! Currency and exchange rate endpoints

use api_types::rates::{
    ConversionView, ConvertQuery, CurrenciesQuery, CurrenciesResponse, CurrencyView,
    RateView, RatesResponse, RefreshResponse,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use engine::{CurrencyCode, Money, Principal};

use crate::{ServerError, server::ServerState};

pub async fn currencies(
    State(state): State<ServerState>,
    Query(query): Query<CurrenciesQuery>,
) -> Result<Json<CurrenciesResponse>, ServerError> {
    let currencies = state
        .engine
        .rates()
        .currencies(!query.include_inactive)
        .await?
        .into_iter()
        .map(|c| CurrencyView {
            code: c.code.to_string(),
            name: c.name,
            symbol: c.symbol,
            minor_units: c.minor_units,
            active: c.active,
        })
        .collect();
    Ok(Json(CurrenciesResponse { currencies }))
}

pub async fn latest(State(state): State<ServerState>) -> Result<Json<RatesResponse>, ServerError> {
    let rates = state
        .engine
        .rates()
        .latest_rates()
        .await?
        .into_iter()
        .map(|r| RateView {
            currency: r.currency.to_string(),
            rate_to_base: r.rate_to_base,
            rate_from_base: r.rate_from_base,
            source: r.source,
            timestamp: r.timestamp,
        })
        .collect();
    Ok(Json(RatesResponse {
        base_currency: state.engine.base_currency().to_string(),
        rates,
    }))
}

pub async fn convert(
    State(state): State<ServerState>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConversionView>, ServerError> {
    let rates = state.engine.rates();
    let from = CurrencyCode::try_from(query.from.as_str())?;
    let to = CurrencyCode::try_from(query.to.as_str())?;
    let amount = Money::parse(&query.amount, rates.minor_units(&from).await?)?;

    let conversion = rates.convert(amount, &from, &to).await?;
    Ok(Json(ConversionView {
        amount: conversion.amount.to_string(),
        currency: to.to_string(),
        rate: conversion.rate,
        rate_timestamp: conversion.rate_timestamp,
        stale: conversion.stale,
    }))
}

pub async fn refresh(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<RefreshResponse>, ServerError> {
    let report = state.engine.refresh_exchange_rates(&principal).await?;
    Ok(Json(RefreshResponse {
        inserted: report.inserted,
        skipped_recent: report.skipped_recent,
        missing: report.missing,
    }))
}
