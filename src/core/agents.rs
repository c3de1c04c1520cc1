use crate::domain::model::AgentProfile;

pub const BUSINESS_ANALYST: &str = "BusinessAnalyst";
pub const SOFTWARE_ENGINEER: &str = "SoftwareEngineer";
pub const PRODUCT_OWNER: &str = "ProductOwner";

/// 預設團隊，依發言順序排列；最後一位負責核准
pub fn default_team(approval_marker: &str) -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            name: BUSINESS_ANALYST.to_string(),
            description: "Business Analyst".to_string(),
            instructions: "You are a business analyst who takes the requirements from the user \
                (the customer) and creates a project plan for creating the requested web app. \
                Describe the user stories, the pages and the behaviour the software engineer \
                must build. Keep the plan concise and do not write code yourself."
                .to_string(),
        },
        AgentProfile {
            name: SOFTWARE_ENGINEER.to_string(),
            description: "Software Engineer".to_string(),
            instructions: "You are a software engineer who builds the web app described by the \
                business analyst using HTML, CSS and JavaScript in a single index.html file. \
                Always return the complete file inside one ```html fenced code block. When the \
                product owner requests changes, return the full updated file again."
                .to_string(),
        },
        AgentProfile {
            name: PRODUCT_OWNER.to_string(),
            description: "Product Owner".to_string(),
            instructions: format!(
                "You are the product owner. Verify that the software engineer's code meets every \
                 requirement from the user and the business analyst's plan, and that it is a \
                 complete, working index.html. If anything is missing or broken, list the exact \
                 changes needed. When everything is complete reply with {} and nothing else \
                 that asks for more work.",
                approval_marker
            ),
        },
    ]
}
