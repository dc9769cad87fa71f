use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub calendar_api_base_url: String,
    pub calendar_api_token: String,
    pub calendar_organizer_email: String,
    pub push_api_base_url: String,
    pub push_api_token: String,
    pub payment_api_base_url: String,
    pub payment_api_secret_key: String,
    pub payment_application_fee_bps: u32,
    pub scheduling: SchedulingConfig,
}

/// Knobs for the availability / recurrence engine. Windows are in days.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub lookahead_days: i64,
    pub conflict_horizon_days: i64,
    pub provider_utc_offset_hours: i32,
    /// Day offset applied to each materialized recurrence instance.
    /// 0 keeps instances on the recurrence weekday; the legacy scheduler
    /// shipped with 1.
    pub recurrence_instance_day_offset: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 30,
            conflict_horizon_days: 31,
            provider_utc_offset_hours: -3,
            recurrence_instance_day_offset: 0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            calendar_api_base_url: env::var("CALENDAR_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("CALENDAR_API_BASE_URL not set, using empty value");
                    String::new()
                }),
            calendar_api_token: env::var("CALENDAR_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("CALENDAR_API_TOKEN not set, using empty value");
                    String::new()
                }),
            calendar_organizer_email: env::var("CALENDAR_ORGANIZER_EMAIL")
                .unwrap_or_else(|_| {
                    warn!("CALENDAR_ORGANIZER_EMAIL not set, using empty value");
                    String::new()
                }),
            push_api_base_url: env::var("PUSH_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("PUSH_API_BASE_URL not set, using default");
                    "https://exp.host/--/api/v2/push/send".to_string()
                }),
            push_api_token: env::var("PUSH_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("PUSH_API_TOKEN not set, using empty value");
                    String::new()
                }),
            payment_api_base_url: env::var("PAYMENT_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_API_BASE_URL not set, using empty value");
                    String::new()
                }),
            payment_api_secret_key: env::var("PAYMENT_API_SECRET_KEY")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_API_SECRET_KEY not set, using empty value");
                    String::new()
                }),
            payment_application_fee_bps: parse_env_or("PAYMENT_APPLICATION_FEE_BPS", 1000),
            scheduling: SchedulingConfig {
                lookahead_days: parse_env_or("SCHEDULING_LOOKAHEAD_DAYS", 30),
                conflict_horizon_days: parse_env_or("SCHEDULING_CONFLICT_HORIZON_DAYS", 31),
                provider_utc_offset_hours: parse_env_or("SCHEDULING_UTC_OFFSET_HOURS", -3),
                recurrence_instance_day_offset: parse_env_or("RECURRENCE_INSTANCE_DAY_OFFSET", 0),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.calendar_api_base_url.is_empty()
            && !self.calendar_api_token.is_empty()
            && !self.calendar_organizer_email.is_empty()
    }

    pub fn is_push_configured(&self) -> bool {
        !self.push_api_base_url.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_api_base_url.is_empty() && !self.payment_api_secret_key.is_empty()
    }
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("{} is not a valid value, using default", name);
                default
            }
        },
        Err(_) => default,
    }
}
