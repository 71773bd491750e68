use std::sync::Arc;

use crate::application::directory::DirectoryService;
use crate::application::revalidation::RevalidationService;

#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<DirectoryService>,
    pub revalidation: Arc<RevalidationService>,
}
