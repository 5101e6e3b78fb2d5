//! Sample user services served by the `envelope-server` binary.
//!
//! ```text
//! POST /api/getuserinfo  {"requestId": "1", "requestMs": 1598848960000, "userId": "user123"}
//!   → {"requestId": "1", "errCode": 0, "errMsg": "succ",
//!      "data": {"userId": "user123", "userName": "user00", "userAge": 20}}
//!
//! POST /api/userinfo     {"requestId": "1", "action": "mod", "userId": "user123"}
//!   → {"requestId": "1", "errCode": 0, "errMsg": "succ", "data": {"userId": "user123"}}
//! ```

use serde::{Deserialize, Serialize};

use crate::envelope::{RequestContext, NO_ACTION};
use crate::error::{RegistrationError, ValidationError};
use crate::routing::{handler_fn, Methods, RouteTable};

/// errCode for a missing or malformed request parameter.
pub const ERR_CODE_PARAM: u32 = 10001;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserInfoReq {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserInfoRsp {
    pub user_id: String,
    pub user_name: String,
    pub user_age: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModUserInfoReq {
    pub action: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModUserInfoRsp {
    pub user_id: String,
}

fn param_err() -> ValidationError {
    ValidationError::new(ERR_CODE_PARAM, "para err")
}

/// `/api/getuserinfo`, called without an action.
pub fn get_user_info(ctx: &mut RequestContext) {
    let req: GetUserInfoReq = match ctx.decode_payload() {
        Ok(req) => req,
        Err(e) => {
            ctx.span().in_scope(|| tracing::info!(error = %e, "Bad getuserinfo payload"));
            return ctx.reject(param_err());
        }
    };
    if req.user_id.is_empty() {
        return ctx.reject(param_err());
    }

    let rsp = GetUserInfoRsp {
        user_id: req.user_id,
        user_name: "user00".to_string(),
        user_age: 20,
    };
    if let Err(e) = ctx.set_rsp(&rsp) {
        tracing::error!(error = %e, "Failed to serialize getuserinfo response");
        ctx.reject(param_err());
    }
}

/// `/api/userinfo` with action `mod`.
pub fn mod_user_info(ctx: &mut RequestContext) {
    let req: ModUserInfoReq = match ctx.decode_payload() {
        Ok(req) => req,
        Err(e) => {
            ctx.span().in_scope(|| tracing::info!(error = %e, "Bad userinfo payload"));
            return ctx.reject(param_err());
        }
    };
    tracing::debug!(action = %req.action, user_id = %req.user_id, "Modify user info");
    if req.user_id.is_empty() {
        return ctx.reject(param_err());
    }

    let rsp = ModUserInfoRsp { user_id: req.user_id };
    if let Err(e) = ctx.set_rsp(&rsp) {
        tracing::error!(error = %e, "Failed to serialize userinfo response");
        ctx.reject(param_err());
    }
}

/// Register the sample services on `table`.
pub fn register(table: &mut RouteTable) -> Result<(), RegistrationError> {
    table.register("api/getuserinfo", NO_ACTION, Methods::Post, handler_fn(get_user_info))?;
    table.register("api/userinfo", "mod", Methods::Post, handler_fn(mod_user_info))?;
    Ok(())
}
