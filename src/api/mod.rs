pub mod menu_items;
pub mod tables;

pub struct ApiUrls;

impl ApiUrls {
    pub fn get_menu_service_url() -> String {
        std::env::var("MENU_SERVICE_URL").unwrap_or("http://localhost:3000".to_string())
    }

    pub fn get_table_service_url() -> String {
        std::env::var("TABLE_SERVICE_URL").unwrap_or("http://localhost:3000".to_string())
    }
}
