// src/main.rs

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthStatus {
    status: String,
    store: String,
    collections: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
    name: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: SessionUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoursSummary {
    total_employees: usize,
    completed: usize,
    total_hours: f64,
    average_hours: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeHoursReport {
    summary: HoursSummary,
    week_number: u32,
    year: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CostReport {
    projects: Vec<Value>,
    summary: Value,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = env::var("TIMEOS_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let email = env::var("TIMEOS_EMAIL").unwrap_or_else(|_| "ana.garcia@timeos.com".to_string());
    let password = env::var("TIMEOS_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health = client
        .get(format!("{}/api/health", base_url))
        .send()
        .await?
        .json::<Envelope<HealthStatus>>()
        .await?;
    match health.data {
        Some(status) => println!(
            "Health: {} (store {}, {} collections)",
            status.status,
            status.store,
            status.collections.len()
        ),
        None => println!("Health check failed: {:?}", health.error),
    }

    // Test 2: Protected route without a session
    println!("\n🔍 Testing protected endpoint without a token...");
    let anonymous = client
        .get(format!("{}/api/projects", base_url))
        .send()
        .await?;
    println!("Expected 401, got {}", anonymous.status());

    // Test 3: Login
    println!("\n🔍 Logging in as {}...", email);
    let login = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&LoginRequest {
            email: &email,
            password: &password,
        })
        .send()
        .await?
        .json::<Envelope<LoginResponse>>()
        .await?;
    let Some(session) = login.data else {
        println!("Login failed: {:?}", login.error);
        return Ok(());
    };
    println!(
        "Logged in as {} ({}, {})",
        session.user.name, session.user.id, session.user.role
    );

    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", session.token))?,
    );

    // Test 4: Weekly hours report
    println!("\n🔍 Testing employee hours report...");
    let report = client
        .get(format!("{}/api/reports/employee-hours", base_url))
        .headers(headers.clone())
        .send()
        .await?
        .json::<Envelope<EmployeeHoursReport>>()
        .await?;
    match report.data {
        Some(report) => println!(
            "Week {}/{}: {} employees, {} complete, {}h total, {}h average",
            report.week_number,
            report.year,
            report.summary.total_employees,
            report.summary.completed,
            report.summary.total_hours,
            report.summary.average_hours
        ),
        None => println!("Report failed: {:?}", report.error),
    }

    // Test 5: Cost report
    println!("\n🔍 Testing cost report...");
    let costs = client
        .get(format!("{}/api/reports/costs", base_url))
        .headers(headers.clone())
        .send()
        .await?
        .json::<Envelope<CostReport>>()
        .await?;
    if costs.success {
        if let Some(costs) = costs.data {
            println!("{} projects", costs.projects.len());
            for project in &costs.projects {
                println!(
                    "  {} revenue={} cost={} margin={}% ({})",
                    project["name"],
                    project["revenue"],
                    project["actualCost"],
                    project["profitMargin"],
                    project["profitability"]
                );
            }
            println!("Summary: {}", costs.summary);
        }
    } else {
        println!("Cost report failed: {:?}", costs.error);
    }

    // Test 6: Logout
    println!("\n🔍 Logging out...");
    let logout = client
        .post(format!("{}/api/auth/logout", base_url))
        .headers(headers)
        .send()
        .await?;
    println!("Logout status: {}", logout.status());

    println!("\n✅ Testing complete!");

    Ok(())
}
