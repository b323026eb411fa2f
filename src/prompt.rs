//! Prompt assembly for question answering.

/// Question-answering template. `{context}` and `{question}` are substituted.
pub const QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
Context: {context}\n\n\
Question: {question}\n\n\
Answer:";

/// Separator between context chunks.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Build the prompt from retrieved chunk texts (nearest first) and the question.
///
/// Chunks are used whole, in the order given.
pub fn assemble<S: AsRef<str>>(chunks: &[S], question: &str) -> String {
    let context = chunks
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    // Question first: the template's own `{context}` precedes it, so replacen
    // never touches placeholders typed into the question or the documents
    QA_TEMPLATE
        .replacen("{question}", question, 1)
        .replacen("{context}", &context, 1)
}
