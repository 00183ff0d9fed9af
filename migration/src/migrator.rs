use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202607130001_create_tribes_and_users::Migration),
            Box::new(migrations::m202607130002_create_attendance::Migration),
        ]
    }
}
