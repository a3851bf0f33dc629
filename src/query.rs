//! GraphQL query construction for the `rekts` listing

use serde::Serialize;

/// Number of records requested per page
pub const PAGE_SIZE: u32 = 50;

const REKTS_QUERY_TEMPLATE: &str = r#"query {
    rekts(
        pageNumber: {page_number}
        pageSize: {page_size}
    ) {
        id
        date
        projectName
        category
        fundsLost
        issueType
    }
}"#;

/// Build the GraphQL document requesting one page of incidents.
pub fn build_query(page_number: u32, page_size: u32) -> String {
    REKTS_QUERY_TEMPLATE
        .replace("{page_number}", &page_number.to_string())
        .replace("{page_size}", &page_size.to_string())
}

/// JSON body POSTed to the GraphQL endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
}

impl GraphQlRequest {
    pub fn for_page(page_number: u32, page_size: u32) -> Self {
        Self {
            query: build_query(page_number, page_size),
        }
    }
}
