//! `PgRow` → domain-entity conversions, grouped here so each query module
//! stays focused on its SQL.

use codegraph_core::domain::{
    ConfirmedEntryPoint, EntryPointCandidate, EntryPointType, File, JobStatus, Language,
    LlmConfig, Organization, ParsingJob, Reference, ReferenceType, Repository, RepositoryStatus,
    Symbol, SymbolKind,
};
use codegraph_core::{CodegraphError, Id, Result};
use sqlx::{postgres::PgRow, Row};

fn get<'r, T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>>(
    row: &'r PgRow,
    col: &'static str,
) -> Result<T> {
    row.try_get(col)
        .map_err(|e| CodegraphError::infra(format!("missing column {col}: {e}")))
}

fn get_id(row: &PgRow, col: &'static str) -> Result<Id> {
    let uuid: uuid::Uuid = get(row, col)?;
    Ok(Id::from_uuid(uuid))
}

fn get_id_opt(row: &PgRow, col: &'static str) -> Result<Option<Id>> {
    let uuid: Option<uuid::Uuid> = get(row, col)?;
    Ok(uuid.map(Id::from_uuid))
}

pub fn row_to_organization(row: &PgRow) -> Result<Organization> {
    let llm_api_key: Option<String> = get(row, "llm_api_key")?;
    let llm_base_url: Option<String> = get(row, "llm_base_url")?;
    let llm_config = match (llm_api_key, llm_base_url) {
        (Some(api_key), Some(base_url)) => Some(LlmConfig {
            api_key,
            base_url,
            model_id: get::<Option<String>>(row, "llm_model_id")?.unwrap_or_default(),
            max_tokens: get::<Option<i32>>(row, "llm_max_tokens")?.unwrap_or(4096) as u32,
        }),
        _ => None,
    };

    Ok(Organization {
        id: get_id(row, "id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        llm_config,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub fn row_to_repository(row: &PgRow) -> Result<Repository> {
    let status_str: String = get(row, "status")?;
    let languages: serde_json::Value = get(row, "languages")?;

    Ok(Repository {
        id: get_id(row, "id")?,
        org_id: get_id(row, "org_id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        root_path: get(row, "root_path")?,
        status: parse_repository_status(&status_str)?,
        total_files: get(row, "total_files")?,
        parsed_files: get(row, "parsed_files")?,
        error_message: get(row, "error_message")?,
        languages: serde_json::from_value(languages).unwrap_or_default(),
        repo_tree: get(row, "repo_tree")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub fn row_to_file(row: &PgRow) -> Result<File> {
    let language_str: String = get(row, "language")?;

    Ok(File {
        id: get_id(row, "id")?,
        repo_id: get_id(row, "repo_id")?,
        relative_path: get(row, "relative_path")?,
        language: parse_language(&language_str)?,
        content_hash: get(row, "content_hash")?,
        content: get(row, "content")?,
        folder_structure: get(row, "folder_structure")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub fn row_to_symbol(row: &PgRow) -> Result<Symbol> {
    let kind_str: String = get(row, "kind")?;

    Ok(Symbol {
        id: get_id(row, "id")?,
        file_id: get_id(row, "file_id")?,
        repo_id: get_id(row, "repo_id")?,
        name: get(row, "name")?,
        qualified_name: get(row, "qualified_name")?,
        kind: parse_symbol_kind(&kind_str)?,
        source_code: get(row, "source_code")?,
        signature: get(row, "signature")?,
        parent_symbol_id: get_id_opt(row, "parent_symbol_id")?,
        extra_data: get(row, "extra_data")?,
        start_line: get(row, "start_line")?,
        end_line: get(row, "end_line")?,
        start_col: get(row, "start_col")?,
        end_col: get(row, "end_col")?,
    })
}

pub fn row_to_reference(row: &PgRow) -> Result<Reference> {
    let reference_type_str: String = get(row, "reference_type")?;

    Ok(Reference {
        id: get_id(row, "id")?,
        repo_id: get_id(row, "repo_id")?,
        source_symbol_id: get_id(row, "source_symbol_id")?,
        target_symbol_id: get_id_opt(row, "target_symbol_id")?,
        source_file_path: get(row, "source_file_path")?,
        source_symbol_name: get(row, "source_symbol_name")?,
        target_file_path: get(row, "target_file_path")?,
        target_symbol_name: get(row, "target_symbol_name")?,
        reference_type: parse_reference_type(&reference_type_str)?,
    })
}

pub fn row_to_job(row: &PgRow) -> Result<ParsingJob> {
    let status_str: String = get(row, "status")?;

    Ok(ParsingJob {
        id: get_id(row, "id")?,
        repo_id: get_id(row, "repo_id")?,
        status: parse_job_status(&status_str)?,
        worker_id: get(row, "worker_id")?,
        error_message: get(row, "error_message")?,
        created_at: get(row, "created_at")?,
        started_at: get(row, "started_at")?,
        completed_at: get(row, "completed_at")?,
    })
}

pub fn row_to_candidate(row: &PgRow) -> Result<EntryPointCandidate> {
    let type_str: String = get(row, "entry_point_type")?;

    Ok(EntryPointCandidate {
        id: get_id(row, "id")?,
        repo_id: get_id(row, "repo_id")?,
        symbol_id: get_id(row, "symbol_id")?,
        file_id: get_id(row, "file_id")?,
        entry_point_type: parse_entry_point_type(&type_str)?,
        framework: get(row, "framework")?,
        detection_pattern: get(row, "detection_pattern")?,
        entry_metadata: get(row, "entry_metadata")?,
        confidence_score: get(row, "confidence_score")?,
        created_at: get(row, "created_at")?,
    })
}

pub fn row_to_confirmed_entry_point(row: &PgRow) -> Result<ConfirmedEntryPoint> {
    let type_str: String = get(row, "entry_point_type")?;

    Ok(ConfirmedEntryPoint {
        id: get_id(row, "id")?,
        repo_id: get_id(row, "repo_id")?,
        symbol_id: get_id(row, "symbol_id")?,
        file_id: get_id(row, "file_id")?,
        entry_point_type: parse_entry_point_type(&type_str)?,
        framework: get(row, "framework")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        entry_metadata: get(row, "entry_metadata")?,
        ai_confidence: get(row, "ai_confidence")?,
        ai_reasoning: get(row, "ai_reasoning")?,
        detected_at: get(row, "detected_at")?,
        confirmed_at: get(row, "confirmed_at")?,
    })
}

fn parse_repository_status(s: &str) -> Result<RepositoryStatus> {
    match s {
        "pending" => Ok(RepositoryStatus::Pending),
        "parsing" => Ok(RepositoryStatus::Parsing),
        "completed" => Ok(RepositoryStatus::Completed),
        "failed" => Ok(RepositoryStatus::Failed),
        other => Err(CodegraphError::infra(format!("unknown repository status: {other}"))),
    }
}

fn parse_job_status(s: &str) -> Result<JobStatus> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "parsing" => Ok(JobStatus::Parsing),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(CodegraphError::infra(format!("unknown job status: {other}"))),
    }
}

fn parse_language(s: &str) -> Result<Language> {
    match s {
        "python" => Ok(Language::Python),
        "java" => Ok(Language::Java),
        "rust" => Ok(Language::Rust),
        "javascript" => Ok(Language::Javascript),
        "kotlin" => Ok(Language::Kotlin),
        other => Err(CodegraphError::infra(format!("unknown language: {other}"))),
    }
}

fn parse_symbol_kind(s: &str) -> Result<SymbolKind> {
    Ok(match s {
        "module" => SymbolKind::Module,
        "class" => SymbolKind::Class,
        "function" => SymbolKind::Function,
        "method" => SymbolKind::Method,
        "variable" => SymbolKind::Variable,
        "constant" => SymbolKind::Constant,
        "import" => SymbolKind::Import,
        "interface" => SymbolKind::Interface,
        "enum" => SymbolKind::Enum,
        "struct" => SymbolKind::Struct,
        "trait" => SymbolKind::Trait,
        "impl" => SymbolKind::Impl,
        other => return Err(CodegraphError::infra(format!("unknown symbol kind: {other}"))),
    })
}

fn parse_reference_type(s: &str) -> Result<ReferenceType> {
    Ok(match s {
        "call" => ReferenceType::Call,
        "import" => ReferenceType::Import,
        "inheritance" => ReferenceType::Inheritance,
        "type_annotation" => ReferenceType::TypeAnnotation,
        "instantiation" => ReferenceType::Instantiation,
        "member" => ReferenceType::Member,
        other => return Err(CodegraphError::infra(format!("unknown reference type: {other}"))),
    })
}

fn parse_entry_point_type(s: &str) -> Result<EntryPointType> {
    Ok(match s {
        "http" => EntryPointType::Http,
        "event" => EntryPointType::Event,
        "scheduler" => EntryPointType::Scheduler,
        other => return Err(CodegraphError::infra(format!("unknown entry point type: {other}"))),
    })
}
