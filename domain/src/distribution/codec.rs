//! Binary payload codec for the cluster channels.
//!
//! All integers are fixed-width big-endian; batches are prefixed with their
//! record count. The frame carrying a payload has its own version byte
//! ([`WIRE_VERSION`]) and length prefix, added by the transport.
//!
//! ```text
//! command  : u8
//! exams    : count:u32 { stage:i32 id_exam:i32 answers:u32 { qst_idx:i32 ans_idx:i32 }* }*
//! results  : count:u32 { stage:i32 id_exam:i32 correct:i32 wrong:i32 unscored:i32 score:f64 }*
//! ```
//!
//! Answer keys are not encoded here: they travel as the UTF-8 JSON produced
//! by [`AnswerStore::serialize_subset`](crate::AnswerStore::serialize_subset).

use crate::core::ids::{ExamId, StageId};
use crate::distribution::command::WorkerCommand;
use crate::exam::entities::{ExamResponse, ScoreResult, StudentExam};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Version of the cluster wire format, checked on every frame.
pub const WIRE_VERSION: u8 = 1;

const COUNT_LEN: usize = 4;
const EXAM_HEADER_LEN: usize = 12;
const RESPONSE_LEN: usize = 8;
const RESULT_LEN: usize = 28;

/// Errors raised while decoding a channel payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Payload declares {count} records but only {remaining} bytes remain")]
    CountOverflow { count: u32, remaining: usize },

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    #[error("Unknown worker command byte {0}")]
    UnknownCommand(u8),

    #[error("Command payload must be exactly 1 byte, got {0}")]
    InvalidCommandLength(usize),
}

pub fn encode_command(command: WorkerCommand) -> Bytes {
    Bytes::copy_from_slice(&[command.as_byte()])
}

pub fn decode_command(payload: &[u8]) -> Result<WorkerCommand, CodecError> {
    match payload {
        [byte] => WorkerCommand::try_from(*byte),
        other => Err(CodecError::InvalidCommandLength(other.len())),
    }
}

pub fn encode_exam_batch(exams: &[StudentExam]) -> Bytes {
    let answers: usize = exams.iter().map(|e| e.answers.len()).sum();
    let mut buf =
        BytesMut::with_capacity(COUNT_LEN + exams.len() * EXAM_HEADER_LEN + answers * RESPONSE_LEN);

    buf.put_u32(exams.len() as u32);
    for exam in exams {
        buf.put_i32(exam.stage.get());
        buf.put_i32(exam.exam_id.get());
        buf.put_u32(exam.answers.len() as u32);
        for answer in &exam.answers {
            buf.put_i32(answer.question);
            buf.put_i32(answer.response);
        }
    }
    buf.freeze()
}

pub fn decode_exam_batch(mut payload: &[u8]) -> Result<Vec<StudentExam>, CodecError> {
    let count = read_count(&mut payload, EXAM_HEADER_LEN)?;
    let mut exams = Vec::with_capacity(count);

    for _ in 0..count {
        ensure(&payload, EXAM_HEADER_LEN)?;
        let stage = StageId::new(payload.get_i32());
        let exam_id = ExamId::new(payload.get_i32());
        let answer_count = read_count(&mut payload, RESPONSE_LEN)?;

        let mut answers = Vec::with_capacity(answer_count);
        for _ in 0..answer_count {
            ensure(&payload, RESPONSE_LEN)?;
            answers.push(ExamResponse::new(payload.get_i32(), payload.get_i32()));
        }
        exams.push(StudentExam {
            stage,
            exam_id,
            answers,
        });
    }

    finish(&payload)?;
    Ok(exams)
}

pub fn encode_result_batch(results: &[ScoreResult]) -> Bytes {
    let mut buf = BytesMut::with_capacity(COUNT_LEN + results.len() * RESULT_LEN);

    buf.put_u32(results.len() as u32);
    for result in results {
        buf.put_i32(result.stage.get());
        buf.put_i32(result.exam_id.get());
        buf.put_i32(result.correct);
        buf.put_i32(result.wrong);
        buf.put_i32(result.unscored);
        buf.put_f64(result.score);
    }
    buf.freeze()
}

pub fn decode_result_batch(mut payload: &[u8]) -> Result<Vec<ScoreResult>, CodecError> {
    let count = read_count(&mut payload, RESULT_LEN)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        ensure(&payload, RESULT_LEN)?;
        results.push(ScoreResult {
            stage: StageId::new(payload.get_i32()),
            exam_id: ExamId::new(payload.get_i32()),
            correct: payload.get_i32(),
            wrong: payload.get_i32(),
            unscored: payload.get_i32(),
            score: payload.get_f64(),
        });
    }

    finish(&payload)?;
    Ok(results)
}

/// Read a record count and check that the records can fit in what is left.
fn read_count(payload: &mut &[u8], min_record_len: usize) -> Result<usize, CodecError> {
    ensure(payload, COUNT_LEN)?;
    let count = payload.get_u32();
    let remaining = payload.remaining();
    let fits = (count as usize)
        .checked_mul(min_record_len)
        .is_some_and(|needed| needed <= remaining);
    if !fits {
        return Err(CodecError::CountOverflow { count, remaining });
    }
    Ok(count as usize)
}

fn ensure(payload: &&[u8], needed: usize) -> Result<(), CodecError> {
    let remaining = payload.remaining();
    if remaining < needed {
        return Err(CodecError::Truncated { needed, remaining });
    }
    Ok(())
}

fn finish(payload: &&[u8]) -> Result<(), CodecError> {
    match payload.remaining() {
        0 => Ok(()),
        extra => Err(CodecError::TrailingBytes(extra)),
    }
}
