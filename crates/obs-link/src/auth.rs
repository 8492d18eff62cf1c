use base64::engine::{general_purpose::STANDARD as BASE64_STANDARD, Engine};
use sha2::{Digest, Sha256};

/// Compute the Identify `authentication` string for an OBS challenge.
///
/// `secret = base64(sha256(password + salt))`, then
/// `authentication = base64(sha256(secret + challenge))`.
pub fn authentication_response(password: &str, salt: &str, challenge: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(password.as_bytes());
	hasher.update(salt.as_bytes());
	let secret = BASE64_STANDARD.encode(hasher.finalize());

	let mut second_hasher = Sha256::new();
	second_hasher.update(secret.as_bytes());
	second_hasher.update(challenge.as_bytes());
	BASE64_STANDARD.encode(second_hasher.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn matches_protocol_reference_vector() {
		let auth = authentication_response(
			"supersecretpassword",
			"lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=",
			"+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
		);
		assert_eq!(auth, "1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4=");
	}

	#[test]
	fn differs_per_password() {
		assert_eq!(authentication_response("correct", "salt", "challenge"), "cISp6Ke/7kij8hHddTJ3KKN8jzFrOVBqfeSd6PJcJNk=");
		assert_ne!(authentication_response("wrong", "salt", "challenge"), authentication_response("correct", "salt", "challenge"));
	}
}
