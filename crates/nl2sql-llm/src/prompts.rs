//! Prompt templates for every model role.
//!
//! Templates are filled with `format!`, so user text containing braces is
//! never re-interpreted as a placeholder.

use nl2sql_core::{RouteLabel, TableChunk};
use serde_json::{json, Value};

/// System preamble for the data analyzer.
pub const ANALYZER_PREAMBLE: &str = "You are an AI assistant.
Your task is to explain the provided data and respond to requests
by referencing both the given data and the conversation history.
Base your answers strictly on the provided information and prior messages in the conversation.";

/// System preamble used when the router could not tell what was asked.
pub const CLARIFY_PREAMBLE: &str = "You are an AI assistant helping a user query a database.
The last user message could not be classified as a data request or as an analysis request.
Using the conversation history, explain briefly what is unclear and ask the user
to clarify or provide the missing information. Do not invent data.";

/// Prefix of the message that feeds query results back into a conversation.
pub const DATA_MESSAGE_PREFIX: &str = "These are the data for your analysis.\nData:\n";

/// Fixed answer for requests rejected by the router.
pub const NOT_ALLOWED_ANSWER: &str = "Hi, your request is not allowed.";

/// Few-shot routing prompt.
#[must_use]
pub fn routing_prompt(question: &str) -> String {
    format!(
        "You are an AI assistant that can help decide what is the best action to serve a user request.
You will receive as input a user request in natural language and have to classify it in one of
these categories: generate_sql, analyze_data, not_defined, not_allowed.

Instructions:
- your answer must be in JSON format with key: classification
- if the request needs to read data from database the classification must be: generate_sql
- if the request requires analysis of data already provided the classification must be: analyze_data
- if the request asks to create, modify or delete data or database objects the classification must be: not_allowed
- if it is not clear what the request asks the classification must be: not_defined
- provide only the JSON result. Don't add other comments or questions.

Examples:
User Query: show the names of all employees who registered absences started in 2018 and the total hours reported
Classification: generate_sql

User Query: What is the total amount for invoices with a payment currency of USD from supplier 'CDW'?
Classification: generate_sql

User Query: Analyze the data provided and generate a report.
Classification: analyze_data

User Query: Identify trends and patterns in the provided data.
Classification: analyze_data

User Query: Generate the code for a plot based on barplot.
Classification: analyze_data

User Query: Delete all the orders placed before 2020.
Classification: not_allowed

User Query: Add a column email to the customers table.
Classification: not_allowed

User Query: blue
Classification: not_defined

===Question
{question}
"
    )
}

/// JSON schema constraining the router's answer.
#[must_use]
pub fn routing_schema() -> Value {
    let labels: Vec<&str> = RouteLabel::ALL.iter().map(|l| l.as_str()).collect();
    json!({
        "title": "classification",
        "description": "the classification of the request.",
        "type": "object",
        "properties": {
            "classification": {
                "type": "string",
                "enum": labels,
                "description": "the class of the request"
            }
        },
        "required": ["classification"]
    })
}

/// Prompt asking a model to summarize one table.
#[must_use]
pub fn summary_prompt(table_schema: &str, sample_queries: &[String]) -> String {
    let samples = if sample_queries.is_empty() {
        "(none)".to_string()
    } else {
        sample_queries
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You are a data analyst that can help summarize SQL tables.

Summarize below table by the given context.

Table Schema
{table_schema}

Sample Queries
{samples}

Response guideline
 - You shall write the summary based only on provided information.
 - Note that above sampled queries are only a small sample of queries and thus not all possible uses of the table are represented,
   and only some columns in the table are used.
 - Do not use any adjective to describe the table. For example, you can say that a table contains certain types of data,
   but you cannot say that the table contains a 'wealth' of data, or that it is 'comprehensive'.
 - Do not mention the sampled queries. Only talk objectively about the type of data the table contains and its possible utilities.
 - Please also include some potential use cases of the table, e.g. what kind of questions can be answered by the table,
   what kind of analysis can be done with the table.

Table Summary:
"
    )
}

/// The text embedded for a table: its id followed by its summary.
#[must_use]
pub fn summary_document(table: &str, summary: &str) -> String {
    format!("{table}\nSummary:\n{summary}")
}

/// Prompt asking the reranking model to pick at most `top_n` tables.
#[must_use]
pub fn rerank_prompt(candidates: &[TableChunk], question: &str, top_n: usize) -> String {
    let table_schemas = candidates
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Document {}: {}\n{}", i + 1, chunk.table, chunk.ddl.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are a data scientist that can help select the most relevant tables for SQL query tasks.

Please select the most relevant table(s) that can be used to generate SQL query for the question.

===Response Guidelines
- Only return the most relevant table(s).
- Return at most {top_n} tables.
- Response should be a valid JSON array of table names. For a single table, the format should be [\"table_name\"].
- Enclose always the array in triple backtick.

===Tables
{table_schemas}

===Question
{question}
"
    )
}

/// Prompt asking a model to write one SQL statement.
///
/// When `group_id` is set the model is told to filter on `group_column`,
/// but only in tables that have it.
#[must_use]
pub fn generation_prompt(
    schema: &str,
    query: &str,
    group_id: Option<&str>,
    group_column: &str,
    dialect: &str,
) -> String {
    let group_id = group_id.unwrap_or("None");
    format!(
        "You are a {dialect} SQL expert.
Given a schema and a user query, generate the appropriate SQL query.
Extract from the user query only the information relevant to generate a correct SQL statement.
Ensure the SQL query adheres to the {dialect} dialect.
Identify first all the tables you need to put in join, then all the needed columns and finally write the SQL.
Only write a single read-only SELECT statement.
Enclose the SQL generated with triple backtick always.
If the User Group Id has a value add the proper filter conditions to the query only for tables
containing {group_column} as a column.

Schema:
{schema}

User Query:
{query}

User Group Id:
{group_id}

SQL Query:
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_prompt_embeds_question() {
        let prompt = routing_prompt("how many {orders} last week?");
        assert!(prompt.ends_with("how many {orders} last week?\n"));
        assert!(prompt.contains("not_allowed"));
    }

    #[test]
    fn test_routing_schema_lists_labels() {
        let schema = routing_schema();
        let labels = schema["properties"]["classification"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels[0], "generate_sql");
    }

    #[test]
    fn test_summary_prompt_samples() {
        let prompt = summary_prompt("CREATE TABLE SALES (id INT)", &["top customers".to_string()]);
        assert!(prompt.contains("- top customers"));
        assert!(summary_prompt("x", &[]).contains("(none)"));
    }

    #[test]
    fn test_summary_document_layout() {
        assert_eq!(summary_document("SALES", "Sales facts."), "SALES\nSummary:\nSales facts.");
    }

    #[test]
    fn test_rerank_prompt_numbers_documents() {
        let chunks = vec![
            TableChunk::new("sales", "CREATE TABLE sales (id INT)"),
            TableChunk::new("times", "CREATE TABLE times (d DATE)"),
        ];
        let prompt = rerank_prompt(&chunks, "sales per month", 1);
        assert!(prompt.contains("Document 1: SALES"));
        assert!(prompt.contains("Document 2: TIMES"));
        assert!(prompt.contains("at most 1 tables"));
    }

    #[test]
    fn test_generation_prompt_group_id() {
        let prompt = generation_prompt("CREATE TABLE t (x INT)", "count t", Some("7"), "USER_GROUP_ID", "SQLite");
        assert!(prompt.contains("User Group Id:\n7"));
        assert!(prompt.contains("containing USER_GROUP_ID"));
        assert!(generation_prompt("s", "q", None, "G", "generic").contains("User Group Id:\nNone"));
    }
}
