//! Admin control-plane endpoints under `/v1/admin/control`.
//!
//! These normally need an admin token, either as the client default
//! ([`ClientBuilder::admin_token`](crate::ClientBuilder::admin_token)) or per
//! call ([`RequestOptions::with_admin_token`]).

use crate::api::{post_endpoints, required_id};
use crate::{Client, RequestOptions, Response, Result};
use http::Method;
use serde::Serialize;
use serde_json::Value;

macro_rules! list_endpoints {
    ($($(#[$doc:meta])* $name:ident => [$($segment:literal),+];)+) => {
        $(
            $(#[$doc])*
            pub async fn $name<Q>(&self, query: Option<&Q>, options: RequestOptions) -> Result<Response<Value>>
            where
                Q: Serialize + ?Sized,
            {
                self.execute(Method::GET, &[$($segment),+], query, options).await
            }
        )+
    };
}

macro_rules! tenant_dashboard_endpoints {
    ($($(#[$doc:meta])* $name:ident => $leaf:literal;)+) => {
        $(
            $(#[$doc])*
            pub async fn $name<Q>(
                &self,
                tenant_id: &str,
                query: Option<&Q>,
                options: RequestOptions,
            ) -> Result<Response<Value>>
            where
                Q: Serialize + ?Sized,
            {
                let tenant_id = required_id("tenant_id", tenant_id)?;
                self.execute(Method::GET, &["v1", "admin", "control", "dashboard", "tenant", tenant_id, $leaf], query, options)
                    .await
            }
        )+
    };
}

impl Client {
    post_endpoints! {
        /// `POST /v1/admin/control/tenants`
        control_upsert_tenant => ["v1", "admin", "control", "tenants"];
        /// `POST /v1/admin/control/projects`
        control_upsert_project => ["v1", "admin", "control", "projects"];
        /// `POST /v1/admin/control/api-keys`
        control_create_api_key => ["v1", "admin", "control", "api-keys"];
        /// `POST /v1/admin/control/alerts/routes`
        control_create_alert_route => ["v1", "admin", "control", "alerts", "routes"];
        /// `POST /v1/admin/control/incident-publish/jobs`
        control_enqueue_incident_publish_job => ["v1", "admin", "control", "incident-publish", "jobs"];
        /// `POST /v1/admin/control/incident-publish/jobs/replay`
        control_replay_incident_publish_jobs => ["v1", "admin", "control", "incident-publish", "jobs", "replay"];
    }

    list_endpoints! {
        /// `GET /v1/admin/control/tenants`
        control_list_tenants => ["v1", "admin", "control", "tenants"];
        /// `GET /v1/admin/control/api-keys`
        control_list_api_keys => ["v1", "admin", "control", "api-keys"];
        /// `GET /v1/admin/control/api-keys/stale`
        control_list_stale_api_keys => ["v1", "admin", "control", "api-keys", "stale"];
        /// `GET /v1/admin/control/alerts/routes`
        control_list_alert_routes => ["v1", "admin", "control", "alerts", "routes"];
        /// `GET /v1/admin/control/alerts/deliveries`
        control_list_alert_deliveries => ["v1", "admin", "control", "alerts", "deliveries"];
        /// `GET /v1/admin/control/incident-publish/jobs`
        control_list_incident_publish_jobs => ["v1", "admin", "control", "incident-publish", "jobs"];
        /// `GET /v1/admin/control/audit-events`
        control_list_audit_events => ["v1", "admin", "control", "audit-events"];
    }

    tenant_dashboard_endpoints! {
        /// `GET /v1/admin/control/dashboard/tenant/{tenant_id}/incident-publish-rollup`
        control_tenant_incident_publish_rollup => "incident-publish-rollup";
        /// `GET /v1/admin/control/dashboard/tenant/{tenant_id}/incident-publish-slo`
        control_tenant_incident_publish_slo => "incident-publish-slo";
        /// `GET /v1/admin/control/dashboard/tenant/{tenant_id}/timeseries`
        control_tenant_timeseries => "timeseries";
        /// `GET /v1/admin/control/dashboard/tenant/{tenant_id}/key-usage`
        control_tenant_key_usage => "key-usage";
    }

    /// `POST /v1/admin/control/api-keys/{key_id}/revoke`
    pub async fn control_revoke_api_key(
        &self,
        key_id: &str,
        options: RequestOptions,
    ) -> Result<Response<Value>> {
        let key_id = required_id("key_id", key_id)?;
        self.execute(
            Method::POST,
            &["v1", "admin", "control", "api-keys", key_id, "revoke"],
            None::<&Value>,
            options,
        )
        .await
    }

    /// `POST /v1/admin/control/api-keys/{key_id}/rotate`
    pub async fn control_rotate_api_key<P>(
        &self,
        key_id: &str,
        input: Option<&P>,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        P: Serialize + ?Sized,
    {
        let key_id = required_id("key_id", key_id)?;
        self.execute(
            Method::POST,
            &["v1", "admin", "control", "api-keys", key_id, "rotate"],
            input,
            options,
        )
        .await
    }

    /// `POST /v1/admin/control/alerts/routes/{route_id}/status`
    pub async fn control_update_alert_route_status<P>(
        &self,
        route_id: &str,
        input: &P,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        P: Serialize + ?Sized,
    {
        let route_id = required_id("route_id", route_id)?;
        self.execute(
            Method::POST,
            &["v1", "admin", "control", "alerts", "routes", route_id, "status"],
            Some(input),
            options,
        )
        .await
    }

    /// `PUT /v1/admin/control/tenant-quotas/{tenant_id}`
    pub async fn control_upsert_tenant_quota<P>(
        &self,
        tenant_id: &str,
        input: &P,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        P: Serialize + ?Sized,
    {
        let tenant_id = required_id("tenant_id", tenant_id)?;
        self.execute(
            Method::PUT,
            &["v1", "admin", "control", "tenant-quotas", tenant_id],
            Some(input),
            options,
        )
        .await
    }

    /// `GET /v1/admin/control/tenant-quotas/{tenant_id}`
    pub async fn control_get_tenant_quota(
        &self,
        tenant_id: &str,
        options: RequestOptions,
    ) -> Result<Response<Value>> {
        let tenant_id = required_id("tenant_id", tenant_id)?;
        self.execute(
            Method::GET,
            &["v1", "admin", "control", "tenant-quotas", tenant_id],
            None::<&Value>,
            options,
        )
        .await
    }

    /// `DELETE /v1/admin/control/tenant-quotas/{tenant_id}`
    ///
    /// Sends an empty JSON object as the body.
    pub async fn control_delete_tenant_quota(
        &self,
        tenant_id: &str,
        options: RequestOptions,
    ) -> Result<Response<Value>> {
        let tenant_id = required_id("tenant_id", tenant_id)?;
        self.execute(
            Method::DELETE,
            &["v1", "admin", "control", "tenant-quotas", tenant_id],
            None::<&Value>,
            options,
        )
        .await
    }

    /// `GET /v1/admin/control/dashboard/tenant/{tenant_id}`
    pub async fn control_tenant_dashboard(
        &self,
        tenant_id: &str,
        options: RequestOptions,
    ) -> Result<Response<Value>> {
        let tenant_id = required_id("tenant_id", tenant_id)?;
        self.execute(
            Method::GET,
            &["v1", "admin", "control", "dashboard", "tenant", tenant_id],
            None::<&Value>,
            options,
        )
        .await
    }

    /// `GET /v1/admin/control/diagnostics/tenant/{tenant_id}`
    pub async fn control_tenant_diagnostics<Q>(
        &self,
        tenant_id: &str,
        query: Option<&Q>,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        Q: Serialize + ?Sized,
    {
        let tenant_id = required_id("tenant_id", tenant_id)?;
        self.execute(
            Method::GET,
            &["v1", "admin", "control", "diagnostics", "tenant", tenant_id],
            query,
            options,
        )
        .await
    }
}
