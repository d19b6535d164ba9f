//! JSON API for the pricing and settlement core.
//!
//! Endpoints (tenant id comes from the `x-tenant-id` header on every call;
//! authentication itself is handled upstream):
//! - `POST /api/v1/pricing/resolve`                    — dry-run rule resolution
//! - `POST /api/v1/settlements`                        — confirm a booking
//! - `POST /api/v1/settlements/{booking_id}/reverse`   — cancel a booking
//! - `GET  /api/v1/settlements/statement`              — month statement
//! - `GET  /api/v1/traces/{booking_id}`                — pricing trace lookup
//! - `POST /api/v1/rules`                              — create a pricing rule
//! - `GET  /api/v1/rules`                              — list active rules
//! - `POST /api/v1/rules/{rule_id}/archive`            — soft-retire a rule

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use stayledger_core::domain::booking::BookingContext;
use stayledger_core::domain::ids::{AgencyId, BookingId, HotelId, ProductId, RuleId, TenantId};
use stayledger_core::domain::money::Currency;
use stayledger_core::domain::rule::{PricingRule, RuleAction, RuleScope, RuleValidity};
use stayledger_core::domain::settlement::{SettlementEntry, SettlementMonth};
use stayledger_core::domain::trace::PricingTrace;
use stayledger_core::errors::{ApplicationError, DomainError, InterfaceError};
use stayledger_core::settlement::{SettlementStatement, StatementScope};
use stayledger_db::{
    BookingConfirmation, ConfirmBookingRequest, ConfirmationService, ReversalOutcome, RuleCatalog,
    RuleDraft, ServiceError,
};

#[derive(Clone)]
pub struct AppState {
    pub confirmation: Arc<ConfirmationService>,
    pub catalog: Arc<RuleCatalog>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/pricing/resolve", post(resolve_pricing))
        .route("/api/v1/settlements", post(record_settlement))
        .route("/api/v1/settlements/{booking_id}/reverse", post(reverse_settlement))
        .route("/api/v1/settlements/statement", get(settlement_statement))
        .route("/api/v1/traces/{booking_id}", get(get_pricing_trace))
        .route("/api/v1/rules", post(create_rule).get(list_rules))
        .route("/api/v1/rules/{rule_id}/archive", post(archive_rule))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BookingContextRequest {
    pub agency_id: String,
    pub hotel_id: String,
    pub product_id: String,
    pub product_type: String,
    pub check_in: NaiveDate,
    pub net_amount: Decimal,
    pub sale_currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmSettlementRequest {
    pub booking_id: String,
    pub commission_rate: Decimal,
    #[serde(flatten)]
    pub context: BookingContextRequest,
}

#[derive(Debug, Serialize)]
pub struct ResolvePricingResponse {
    pub rule_id: Option<String>,
    pub priority: i32,
    pub fallback: bool,
    pub markup_percent: Decimal,
    pub sell_amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct SettlementEntryResponse {
    pub entry_id: String,
    pub booking_id: String,
    pub direction: String,
    pub gross: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
    pub currency: String,
    pub sale_currency: String,
    pub settlement_status: String,
    pub month: String,
}

impl SettlementEntryResponse {
    fn from_entry(entry: &SettlementEntry) -> Self {
        Self {
            entry_id: entry.id.0.clone(),
            booking_id: entry.booking_id.0.clone(),
            direction: entry.direction.as_str().to_string(),
            gross: entry.gross,
            commission: entry.commission,
            net: entry.net,
            currency: entry.currency.0.clone(),
            sale_currency: entry.sale_currency.0.clone(),
            settlement_status: entry.status.as_str().to_string(),
            month: entry.month.0.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmSettlementResponse {
    pub entry: SettlementEntryResponse,
    pub net_amount: Decimal,
    pub sell_amount: Decimal,
    pub sell_ledger_amount: Decimal,
    pub fx_snapshot_id: String,
    pub fx_rate: Decimal,
    pub replayed: bool,
}

#[derive(Debug, Serialize)]
pub struct ReverseSettlementResponse {
    pub entry: SettlementEntryResponse,
    pub replayed: bool,
}

#[derive(Debug, Serialize)]
pub struct PricingTraceResponse {
    pub booking_id: String,
    pub matched_rule_id: Option<String>,
    pub matched_priority: i32,
    pub fallback: bool,
    pub markup_percent: Decimal,
    pub net_amount: Decimal,
    pub sell_amount: Decimal,
    pub sell_ledger_amount: Decimal,
    pub fx_snapshot_id: String,
    pub content_hash: String,
    pub created_at: String,
}

impl PricingTraceResponse {
    fn from_trace(trace: &PricingTrace) -> Self {
        Self {
            booking_id: trace.booking_id.0.clone(),
            matched_rule_id: trace.matched_rule_id.as_ref().map(|id| id.0.clone()),
            matched_priority: trace.matched_priority,
            fallback: trace.fallback,
            markup_percent: trace.markup_percent,
            net_amount: trace.net_amount,
            sell_amount: trace.sell_amount,
            sell_ledger_amount: trace.sell_ledger_amount,
            fx_snapshot_id: trace.fx_snapshot_id.0.clone(),
            content_hash: trace.content_hash.clone(),
            created_at: trace.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub month: String,
    pub agency_id: Option<String>,
    pub hotel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub agency_id: Option<String>,
    pub product_id: Option<String>,
    pub product_type: Option<String>,
    pub priority: i32,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub markup_percent: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub rule_id: String,
    pub priority: i32,
    pub status: String,
    pub agency_id: Option<String>,
    pub product_id: Option<String>,
    pub product_type: Option<String>,
    pub markup_percent: Decimal,
    pub notes: Option<String>,
}

impl RuleResponse {
    fn from_rule(rule: &PricingRule) -> Self {
        Self {
            rule_id: rule.id.0.clone(),
            priority: rule.priority,
            status: rule.status.as_str().to_string(),
            agency_id: rule.scope.agency_id.as_ref().map(|id| id.0.clone()),
            product_id: rule.scope.product_id.as_ref().map(|id| id.0.clone()),
            product_type: rule.scope.product_type.clone(),
            markup_percent: rule.action.markup_percent(),
            notes: rule.notes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.user_message().to_string(),
            detail: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn service_error(error: ServiceError, correlation_id: &str) -> ApiError {
    ApiError(ApplicationError::from(error).into_interface(correlation_id))
}

fn domain_error(error: DomainError, correlation_id: &str) -> ApiError {
    ApiError(ApplicationError::Domain(error).into_interface(correlation_id))
}

fn tenant_from_headers(headers: &HeaderMap, correlation_id: &str) -> Result<TenantId, ApiError> {
    headers
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| TenantId(value.to_string()))
        .ok_or_else(|| {
            ApiError(InterfaceError::BadRequest {
                message: "missing x-tenant-id header".to_string(),
                correlation_id: correlation_id.to_string(),
            })
        })
}

fn booking_context(
    tenant_id: TenantId,
    request: BookingContextRequest,
    correlation_id: &str,
) -> Result<BookingContext, ApiError> {
    let sale_currency = Currency::parse(&request.sale_currency)
        .map_err(|error| domain_error(error, correlation_id))?;

    Ok(BookingContext {
        tenant_id,
        agency_id: AgencyId(request.agency_id),
        hotel_id: HotelId(request.hotel_id),
        product_id: ProductId(request.product_id),
        product_type: request.product_type,
        check_in: request.check_in,
        net_amount: request.net_amount,
        sale_currency,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn resolve_pricing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BookingContextRequest>,
) -> Result<Json<ResolvePricingResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;
    let context = booking_context(tenant_id, request, &correlation_id)?;

    let resolution = state
        .confirmation
        .resolve_pricing(&context)
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok(Json(ResolvePricingResponse {
        rule_id: resolution.rule_id.map(|id| id.0),
        priority: resolution.priority,
        fallback: resolution.fallback,
        markup_percent: resolution.markup_percent,
        sell_amount: resolution.sell_amount,
        currency: resolution.currency.0,
    }))
}

pub async fn record_settlement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConfirmSettlementRequest>,
) -> Result<Json<ConfirmSettlementResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;
    let context = booking_context(tenant_id, request.context, &correlation_id)?;

    let confirmation: BookingConfirmation = state
        .confirmation
        .confirm_booking(ConfirmBookingRequest {
            booking_id: BookingId(request.booking_id),
            context,
            commission_rate: request.commission_rate,
        })
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    info!(
        event_name = "api.settlement_recorded",
        correlation_id = %correlation_id,
        booking_id = %confirmation.booking.id.0,
        replayed = confirmation.replayed,
        "settlement recorded"
    );

    Ok(Json(ConfirmSettlementResponse {
        entry: SettlementEntryResponse::from_entry(&confirmation.entry),
        net_amount: confirmation.booking.amounts.net,
        sell_amount: confirmation.booking.amounts.sell,
        sell_ledger_amount: confirmation.booking.amounts.sell_ledger,
        fx_snapshot_id: confirmation.fx_snapshot.id.0.clone(),
        fx_rate: confirmation.fx_snapshot.rate,
        replayed: confirmation.replayed,
    }))
}

pub async fn reverse_settlement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<ReverseSettlementResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;

    let outcome: ReversalOutcome = state
        .confirmation
        .reverse_booking(&tenant_id, &BookingId(booking_id))
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok(Json(ReverseSettlementResponse {
        entry: SettlementEntryResponse::from_entry(&outcome.entry),
        replayed: outcome.replayed,
    }))
}

pub async fn settlement_statement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatementQuery>,
) -> Result<Json<SettlementStatement>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;
    let month = SettlementMonth::parse(&query.month)
        .map_err(|error| domain_error(error, &correlation_id))?;
    let scope = StatementScope {
        agency_id: query.agency_id.map(AgencyId),
        hotel_id: query.hotel_id.map(HotelId),
    };

    let statement = state
        .confirmation
        .settlement_statement(&tenant_id, month, scope)
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok(Json(statement))
}

pub async fn get_pricing_trace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<PricingTraceResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;

    let trace = state
        .confirmation
        .pricing_trace(&tenant_id, &BookingId(booking_id))
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok(Json(PricingTraceResponse::from_trace(&trace)))
}

pub async fn create_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;

    let rule = state
        .catalog
        .create_rule(RuleDraft {
            tenant_id,
            scope: RuleScope {
                agency_id: request.agency_id.map(AgencyId),
                product_id: request.product_id.map(ProductId),
                product_type: request.product_type,
            },
            priority: request.priority,
            validity: RuleValidity { from: request.valid_from, to: request.valid_to },
            action: RuleAction::MarkupPercent { value: request.markup_percent },
            notes: request.notes,
        })
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok((StatusCode::CREATED, Json(RuleResponse::from_rule(&rule))))
}

pub async fn list_rules(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RuleResponse>>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;

    let rules = state
        .catalog
        .list_active(&tenant_id)
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok(Json(rules.iter().map(RuleResponse::from_rule).collect()))
}

pub async fn archive_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(rule_id): Path<String>,
) -> Result<Json<RuleResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant_id = tenant_from_headers(&headers, &correlation_id)?;

    let rule = state
        .catalog
        .archive_rule(&tenant_id, &RuleId(rule_id))
        .await
        .map_err(|error| service_error(error, &correlation_id))?;

    Ok(Json(RuleResponse::from_rule(&rule)))
}
