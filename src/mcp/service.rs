//! MCP service implementation using rmcp.
//!
//! This module defines the TabularService struct with all tools exposed via
//! the MCP protocol using the rmcp framework's macros.

use crate::db::ConnectionRegistry;
use crate::models::DatabaseSummary;
use crate::notes::{NotesStore, WriteNotesOutcome};
use crate::tools::connection::{
    ConnectInput, ConnectOutput, ConnectionToolHandler, CreateInput, DisconnectInput,
    DisconnectOutput, ListOutput,
};
use crate::tools::notes::{NotesToolHandler, ReadNotesInput, ReadNotesOutput, WriteNotesInput};
use crate::tools::query::{QueryInput, QueryOutput, QueryToolHandler};
use crate::tools::transfer::{
    CsvExportInput, CsvImportInput, ExcelTransferInput, TransferToolHandler,
};
use crate::tools::write::{UpdateInput, UpdateOutput, UpdateToolHandler};
use crate::transfer::{ExportSummary, ImportSummary, TransferEngine};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct TabularService {
    /// Shared registry of open databases
    registry: Arc<ConnectionRegistry>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl TabularService {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }

    /// Validate a database identifier.
    ///
    /// Returns the trimmed identifier if non-empty, otherwise an error
    /// guiding the caller to `list`.
    fn validate_id(&self, provided: &str) -> Result<String, McpError> {
        let trimmed = provided.trim();
        if trimmed.is_empty() {
            Err(McpError::invalid_params(
                "id is required. Call list to see open databases, or create/connect one first.",
                None,
            ))
        } else {
            Ok(trimmed.to_string())
        }
    }

    fn connections(&self) -> ConnectionToolHandler {
        ConnectionToolHandler::new(self.registry.clone())
    }

    fn transfers(&self) -> TransferToolHandler {
        TransferToolHandler::new(TransferEngine::new(self.registry.clone()))
    }

    fn notes(&self) -> NotesToolHandler {
        NotesToolHandler::new(NotesStore::new(self.registry.clone()))
    }
}

#[tool_router]
impl TabularService {
    #[tool(
        description = "List open databases.\nReturns each database's id, backing (file or memory), path and file size."
    )]
    async fn list(&self) -> Json<ListOutput> {
        Json(self.connections().list().await)
    }

    #[tool(
        description = "Create a new SQLite database file and open it under the given id.\nFails if the id is in use or the file already exists."
    )]
    async fn create(
        &self,
        Parameters(input): Parameters<CreateInput>,
    ) -> Result<Json<DatabaseSummary>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        self.connections()
            .create(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Open an existing SQLite database file under the given id.\nOmit path to open a fresh in-memory database, which is discarded on disconnect.\nSet read_notes to include the file's sidecar notes."
    )]
    async fn connect(
        &self,
        Parameters(input): Parameters<ConnectInput>,
    ) -> Result<Json<ConnectOutput>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        self.connections()
            .connect(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Close a database and forget its id.\nFiles stay on disk; in-memory data is lost."
    )]
    async fn disconnect(
        &self,
        Parameters(input): Parameters<DisconnectInput>,
    ) -> Result<Json<DisconnectOutput>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        self.connections()
            .disconnect(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Execute SQL and return the resulting rows.\nSupports positional ? parameters.\nOutput format: json (default), table, or markdown."
    )]
    async fn query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        QueryToolHandler::new(self.registry.clone())
            .query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Execute INSERT, UPDATE, DELETE or DDL and return the number of affected rows.\nSupports positional ? parameters; without parameters several statements may be given.\nWith param_sets the statement runs once per set in one transaction; if any set fails, none are kept."
    )]
    async fn update(
        &self,
        Parameters(input): Parameters<UpdateInput>,
    ) -> Result<Json<UpdateOutput>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        UpdateToolHandler::new(self.registry.clone())
            .update(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Import a CSV file with a header row into a table.\nCreates the table with inferred column types if it does not exist; otherwise the header must match the table's columns in order.\nOptional: columns (subset by name or position), column_names (renames), dtype (type per column), encoding (detected when omitted).\nRows already inserted stay if the import fails partway."
    )]
    async fn import_csv(
        &self,
        Parameters(input): Parameters<CsvImportInput>,
    ) -> Result<Json<ImportSummary>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        self.transfers()
            .import_csv(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Export a table to a CSV file with a header row.\nOverwrites the file. NULL and empty text are both written as an empty field, so empty text re-imports as NULL."
    )]
    async fn export_csv(
        &self,
        Parameters(input): Parameters<CsvExportInput>,
    ) -> Result<Json<ExportSummary>, McpError> {
        let mut input = input;
        input.id = self.validate_id(&input.id)?;
        self.transfers()
            .export_csv(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Import an Excel workbook into a table. Not implemented yet; use import_csv.")]
    async fn import_excel(
        &self,
        Parameters(input): Parameters<ExcelTransferInput>,
    ) -> Result<Json<ImportSummary>, McpError> {
        self.transfers()
            .import_excel(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Export a table to an Excel workbook. Not implemented yet; use export_csv.")]
    async fn export_excel(
        &self,
        Parameters(input): Parameters<ExcelTransferInput>,
    ) -> Result<Json<ExportSummary>, McpError> {
        self.transfers()
            .export_excel(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Read notes.\nGive file_path for the notes of one file, or directory for every note file in it."
    )]
    async fn read_notes(
        &self,
        Parameters(input): Parameters<ReadNotesInput>,
    ) -> Result<Json<ReadNotesOutput>, McpError> {
        self.notes()
            .read_notes(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Write a note next to a file (file_path) or next to an open file-backed database (database_identifier).\nReplaces any existing note; empty text deletes it."
    )]
    async fn write_notes(
        &self,
        Parameters(input): Parameters<WriteNotesInput>,
    ) -> Result<Json<WriteNotesOutcome>, McpError> {
        let mut input = input;
        if let Some(id) = input.database_identifier.take() {
            input.database_identifier = Some(self.validate_id(&id)?);
        }
        self.notes()
            .write_notes(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for TabularService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "tabular-mcp-server".to_owned(),
                title: Some("Tabular MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for working with SQLite databases and CSV files.\n\
                \n\
                ## Workflow\n\
                1. Call `list` to see open databases\n\
                2. Open one with `connect` (existing file, or no path for in-memory) or `create` (new file)\n\
                3. Use the `id` from step 2 in `query`, `update`, `import_csv` and `export_csv`\n\
                4. Call `disconnect` when done\n\
                \n\
                ## Import and export\n\
                - `import_csv` creates the table from the header when it does not exist\n\
                - Importing into an existing table requires the header to match its columns in order\n\
                - `export_csv` writes NULL and empty text alike as an empty field; both import back as NULL\n\
                - Excel import/export is not implemented yet\n\
                \n\
                ## Notes\n\
                - Notes are stored next to a file as `<file>.AInotes.txt`\n\
                - In-memory databases cannot carry notes"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> TabularService {
        TabularService::new(Arc::new(ConnectionRegistry::new()))
    }

    #[test]
    fn test_validate_id_trims_whitespace() {
        let service = create_test_service();
        assert_eq!(service.validate_id("  sales  ").unwrap(), "sales");
    }

    #[test]
    fn test_validate_id_rejects_whitespace_only() {
        let service = create_test_service();
        let err = service.validate_id("   ").unwrap_err();
        assert!(err.to_string().contains("id is required"));
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "tabular-mcp-server");
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_all_tools_registered() {
        let service = create_test_service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "connect",
                "create",
                "disconnect",
                "export_csv",
                "export_excel",
                "import_csv",
                "import_excel",
                "list",
                "query",
                "read_notes",
                "update",
                "write_notes",
            ]
        );
    }

    #[test]
    fn test_export_csv_description_covers_empty_text() {
        let service = create_test_service();
        let tool = service
            .tool_router
            .list_all()
            .into_iter()
            .find(|tool| tool.name == "export_csv")
            .unwrap();
        let description = tool.description.unwrap();
        assert!(description.contains("empty text"));
        assert!(description.contains("NULL"));
    }
}
