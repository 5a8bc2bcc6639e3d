use mso_http::{ApiRequest, MsoClient};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = MsoClient::from_env()?;
    client.authenticate().await?;

    let version = client.version().await?;
    println!("platform version: {version}");

    let tenant = json!({
        "name": "demo-tenant",
        "displayName": "demo-tenant",
        "siteAssociations": [],
        "userAssociations": []
    });
    let created = client.post("/api/v1/tenants", tenant).await?;
    let id = created
        .body
        .as_ref()
        .and_then(|body| body["id"].as_str())
        .unwrap_or_default()
        .to_owned();

    // Poll until the new tenant shows up in the listing.
    let listing = client
        .execute_until(&ApiRequest::get("/api/v1/tenants"), |body| {
            !body["tenants"]
                .as_array()
                .is_some_and(|tenants| tenants.iter().any(|tenant| tenant["id"] == id.as_str()))
        })
        .await?;
    println!("tenant visible after {} attempts", listing.attempts);

    client.delete(&format!("/api/v1/tenants/{id}")).await?;
    Ok(())
}
