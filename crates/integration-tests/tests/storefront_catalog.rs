//! Integration tests for the catalog API.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use emberstone_integration_tests::TestContext;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_packages(ctx: &TestContext, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&ctx.catalog)
        .await;
}

async fn mount_categories(ctx: &TestContext, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/store-categories.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&ctx.catalog)
        .await;
}

fn ids(group: &serde_json::Value) -> Vec<String> {
    group["packages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_static_manifest_served() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.get("/store-categories.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"][0]["id"], "vip");
}

#[tokio::test]
async fn test_catalog_without_categories() {
    let ctx = TestContext::new().await;
    mount_packages(&ctx, json!({ "data": [{ "id": 1 }, { "id": 2 }] })).await;
    mount_categories(&ctx, json!({ "categories": [] })).await;

    let (status, catalog) = ctx.get("/api/catalog").await;

    assert_eq!(status, StatusCode::OK);
    let groups = catalog.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], "uncategorized");
    assert_eq!(groups[0]["name"], "All Packages");
    assert_eq!(ids(&groups[0]), ["1", "2"]);
}

#[tokio::test]
async fn test_catalog_groups_and_sorts() {
    let ctx = TestContext::new().await;
    mount_packages(
        &ctx,
        json!([
            { "id": 1, "name": "VIP", "price": "$9.99" },
            { "id": 2, "name": "MVP" },
            { "id": 3, "name": "Fly Pass" },
            { "id": 4, "name": "Mystery" }
        ]),
    )
    .await;
    mount_categories(
        &ctx,
        json!({
            "categories": [
                { "id": "boosts", "name": "Game Boosts", "packages": [{ "id": 3 }, 2], "order": 5 },
                { "id": "ranks", "name": "Ranks", "packages": { "1": true, "2": true }, "order": 1 },
                { "id": "empty", "name": "Nothing", "packages": [99], "order": 3 }
            ]
        }),
    )
    .await;

    let (_, catalog) = ctx.get("/api/catalog").await;
    let groups = catalog.as_array().unwrap();
    let order: Vec<&str> = groups.iter().map(|g| g["id"].as_str().unwrap()).collect();

    assert_eq!(order, ["ranks", "boosts", "uncategorized"]);
    assert_eq!(ids(&groups[0]), ["1", "2"]);
    // Package 2 is listed by both categories.
    assert_eq!(ids(&groups[1]), ["2", "3"]);
    assert_eq!(ids(&groups[2]), ["4"]);
    assert_eq!(groups[2]["name"], "Other Packages");
    // Extra package fields pass through.
    assert_eq!(groups[0]["packages"][0]["price"], "$9.99");
}

#[tokio::test]
async fn test_catalog_single_category_collapses() {
    let ctx = TestContext::new().await;
    mount_packages(&ctx, json!([{ "id": 1 }, { "id": 2 }])).await;
    mount_categories(
        &ctx,
        json!({ "categories": [{ "id": "ranks", "name": "Ranks", "packages": [1, 2] }] }),
    )
    .await;

    let (_, catalog) = ctx.get("/api/catalog").await;
    let groups = catalog.as_array().unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], "ranks");
    assert_eq!(groups[0]["name"], "All Packages");
    assert_eq!(groups[0]["description"], "All available packages");
}

#[tokio::test]
async fn test_categories_endpoint_normalizes() {
    let ctx = TestContext::new().await;
    mount_categories(
        &ctx,
        json!({ "categories": [{ "packages": "not a list", "order": "high" }] }),
    )
    .await;

    let (status, manifest) = ctx.get("/api/catalog/categories").await;
    let category = &manifest["categories"][0];

    assert_eq!(status, StatusCode::OK);
    assert!(category["id"].as_str().unwrap().starts_with("category-"));
    assert_eq!(category["name"], "Unnamed Category");
    assert_eq!(category["description"], "");
    assert_eq!(category["packages"], json!([]));
    assert_eq!(category["order"], 0.0);
}

#[tokio::test]
async fn test_categories_source_down() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/store-categories.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ctx.catalog)
        .await;

    let (status, manifest) = ctx.get("/api/catalog/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["categories"], json!([]));
}

#[tokio::test]
async fn test_refresh_picks_up_changes() {
    let ctx = TestContext::new().await;
    mount_categories(&ctx, json!({ "categories": [{ "id": "ranks", "name": "Ranks" }] })).await;

    let (_, before) = ctx.get("/api/catalog/categories").await;
    assert_eq!(before["categories"].as_array().unwrap().len(), 1);

    ctx.catalog.reset().await;
    mount_categories(
        &ctx,
        json!({ "categories": [{ "id": "ranks", "name": "Ranks" }, { "id": "keys", "name": "Keys" }] }),
    )
    .await;

    // Still cached.
    let (_, cached) = ctx.get("/api/catalog/categories").await;
    assert_eq!(cached["categories"].as_array().unwrap().len(), 1);

    let (status, refreshed) = ctx.post("/api/catalog/refresh", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["categories"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_default_categories_from_packages() {
    let ctx = TestContext::new().await;
    mount_packages(
        &ctx,
        json!([
            { "id": "3307111", "category": "VIP Packages" },
            { "id": "3307114", "category": "Game Boosts" },
            { "id": "3307112", "category": "VIP Packages" }
        ]),
    )
    .await;

    let (status, manifest) = ctx.get("/api/catalog/default-categories").await;
    let categories = manifest["categories"].as_array().unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0]["id"], "vip-packages");
    assert_eq!(categories[0]["packages"], json!(["3307111", "3307112"]));
    assert_eq!(
        categories[1]["description"],
        "Game Boosts for the Minecraft server"
    );
}
