//! Entry point accepting either an MTD matrix or a fetch request.

use crate::error::{Result, UnrollError};
use chrono::NaiveDate;
use unroll_data::units::percent_to_decimal;
use unroll_data::{MTD_RETURN_COL, MtdReturnSource};
use unroll_returns::{Conversion, ConversionConfig, ReturnMatrix, convert_and_validate};

/// Securities and start date to fetch MTD returns for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdRequest {
    /// Security identifiers.
    pub securities: Vec<String>,
    /// First date of interest.
    pub start: NaiveDate,
}

impl MtdRequest {
    /// Create a request.
    pub const fn new(securities: Vec<String>, start: NaiveDate) -> Self {
        Self { securities, start }
    }
}

/// MTD input of the pipeline.
#[derive(Debug, Clone)]
pub enum MtdInput {
    /// A cumulative MTD matrix in decimal units.
    Matrix(ReturnMatrix),
    /// Fetch the matrix from a data source.
    Fetch(MtdRequest),
}

impl From<ReturnMatrix> for MtdInput {
    fn from(matrix: ReturnMatrix) -> Self {
        Self::Matrix(matrix)
    }
}

impl From<MtdRequest> for MtdInput {
    fn from(request: MtdRequest) -> Self {
        Self::Fetch(request)
    }
}

/// Fetch MTD returns from `source` and pivot them into a decimal matrix.
pub async fn fetch_mtd_matrix<S: MtdReturnSource>(
    source: &S,
    request: &MtdRequest,
) -> Result<ReturnMatrix> {
    if request.securities.is_empty() {
        return Err(UnrollError::NoSecurities);
    }

    let df = source
        .fetch_mtd_percent(&request.securities, request.start)
        .await?;
    let df = percent_to_decimal(df)?;
    let matrix = ReturnMatrix::from_long_frame(&df, MTD_RETURN_COL)?;

    tracing::debug!(
        dates = matrix.n_dates(),
        securities = matrix.n_securities(),
        "fetched MTD matrix"
    );

    let missing: Vec<&str> = request
        .securities
        .iter()
        .filter(|s| matrix.security_index(s).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(?missing, "no MTD data returned for some securities");
    }

    Ok(matrix)
}

/// Convert and validate, returning the full [`Conversion`].
///
/// `source` is only consulted for [`MtdInput::Fetch`].
pub async fn excess_conversion<S: MtdReturnSource>(
    input: MtdInput,
    source: &S,
    config: &ConversionConfig,
) -> Result<Conversion> {
    let mtd = match input {
        MtdInput::Matrix(matrix) => matrix,
        MtdInput::Fetch(request) => fetch_mtd_matrix(source, &request).await?,
    };

    Ok(convert_and_validate(&mtd, config)?)
}

/// Daily log returns for `input`, validated against its month-end totals.
pub async fn excess_daily<S: MtdReturnSource>(
    input: MtdInput,
    source: &S,
    config: &ConversionConfig,
) -> Result<ReturnMatrix> {
    let conversion = excess_conversion(input, source, config).await?;
    Ok(conversion.daily)
}
