use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use std::str::FromStr;
use strum_macros::{EnumString, IntoStaticStr};

pub trait FromU32: FromPrimitive {
  #[inline]
  fn fromu32(val: u32) -> Option<Self> {
    Self::from_u32(val)
  }
}

/// Standard tags live in `0x42xxxx`, vendor/extension tags in `0x54xxxx`.
pub const STANDARD_TAG_PREFIX: u8 = 0x42;
pub const EXTENSION_TAG_PREFIX: u8 = 0x54;

// http://docs.oasis-open.org/kmip/spec/v1.4/os/kmip-spec-v1.4-os.html#_Toc490660920
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, FromPrimitive, ToPrimitive, IntoStaticStr, EnumString)]
#[repr(u32)]
pub enum Tag {
  ActivationDate = 0x42_0001,
  ApplicationData = 0x42_0002,
  ApplicationNamespace = 0x42_0003,
  ApplicationSpecificInformation = 0x42_0004,
  ArchiveDate = 0x42_0005,
  AsynchronousCorrelationValue = 0x42_0006,
  AsynchronousIndicator = 0x42_0007,
  Attribute = 0x42_0008,
  AttributeIndex = 0x42_0009,
  AttributeName = 0x42_000A,
  AttributeValue = 0x42_000B,
  Authentication = 0x42_000C,
  BatchCount = 0x42_000D,
  BatchErrorContinuationOption = 0x42_000E,
  BatchItem = 0x42_000F,
  BatchOrderOption = 0x42_0010,
  BlockCipherMode = 0x42_0011,
  CancellationResult = 0x42_0012,
  Certificate = 0x42_0013,
  CertificateIdentifier = 0x42_0014,
  CertificateIssuer = 0x42_0015,
  CertificateIssuerAlternativeName = 0x42_0016,
  CertificateIssuerDistinguishedName = 0x42_0017,
  CertificateRequest = 0x42_0018,
  CertificateRequestType = 0x42_0019,
  CertificateSubject = 0x42_001A,
  CertificateSubjectAlternativeName = 0x42_001B,
  CertificateSubjectDistinguishedName = 0x42_001C,
  CertificateType = 0x42_001D,
  CertificateValue = 0x42_001E,
  CommonTemplateAttribute = 0x42_001F,
  CompromiseDate = 0x42_0020,
  CompromiseOccurrenceDate = 0x42_0021,
  ContactInformation = 0x42_0022,
  Credential = 0x42_0023,
  CredentialType = 0x42_0024,
  CredentialValue = 0x42_0025,
  CriticalityIndicator = 0x42_0026,
  CRTCoefficient = 0x42_0027,
  CryptographicAlgorithm = 0x42_0028,
  CryptographicDomainParameters = 0x42_0029,
  CryptographicLength = 0x42_002A,
  CryptographicParameters = 0x42_002B,
  CryptographicUsageMask = 0x42_002C,
  CustomAttribute = 0x42_002D,
  D = 0x42_002E,
  DeactivationDate = 0x42_002F,
  DerivationData = 0x42_0030,
  DerivationMethod = 0x42_0031,
  DerivationParameters = 0x42_0032,
  DestroyDate = 0x42_0033,
  Digest = 0x42_0034,
  DigestValue = 0x42_0035,
  EncryptionKeyInformation = 0x42_0036,
  G = 0x42_0037,
  HashingAlgorithm = 0x42_0038,
  InitialDate = 0x42_0039,
  InitializationVector = 0x42_003A,
  Issuer = 0x42_003B,
  IterationCount = 0x42_003C,
  IVCounterNonce = 0x42_003D,
  J = 0x42_003E,
  Key = 0x42_003F,
  KeyBlock = 0x42_0040,
  KeyCompressionType = 0x42_0041,
  KeyFormatType = 0x42_0042,
  KeyMaterial = 0x42_0043,
  KeyPartIdentifier = 0x42_0044,
  KeyValue = 0x42_0045,
  KeyWrappingData = 0x42_0046,
  KeyWrappingSpecification = 0x42_0047,
  LastChangeDate = 0x42_0048,
  LeaseTime = 0x42_0049,
  Link = 0x42_004A,
  LinkType = 0x42_004B,
  LinkedObjectIdentifier = 0x42_004C,
  MACSignature = 0x42_004D,
  MACSignatureKeyInformation = 0x42_004E,
  MaximumItems = 0x42_004F,
  MaximumResponseSize = 0x42_0050,
  MessageExtension = 0x42_0051,
  Modulus = 0x42_0052,
  Name = 0x42_0053,
  NameType = 0x42_0054,
  NameValue = 0x42_0055,
  ObjectGroup = 0x42_0056,
  ObjectType = 0x42_0057,
  Offset = 0x42_0058,
  OpaqueDataType = 0x42_0059,
  OpaqueDataValue = 0x42_005A,
  OpaqueObject = 0x42_005B,
  Operation = 0x42_005C,
  OperationPolicyName = 0x42_005D,
  P = 0x42_005E,
  PaddingMethod = 0x42_005F,
  PrimeExponentP = 0x42_0060,
  PrimeExponentQ = 0x42_0061,
  PrimeFieldSize = 0x42_0062,
  PrivateExponent = 0x42_0063,
  PrivateKey = 0x42_0064,
  PrivateKeyTemplateAttribute = 0x42_0065,
  PrivateKeyUniqueIdentifier = 0x42_0066,
  ProcessStartDate = 0x42_0067,
  ProtectStopDate = 0x42_0068,
  ProtocolVersion = 0x42_0069,
  ProtocolVersionMajor = 0x42_006A,
  ProtocolVersionMinor = 0x42_006B,
  PublicExponent = 0x42_006C,
  PublicKey = 0x42_006D,
  PublicKeyTemplateAttribute = 0x42_006E,
  PublicKeyUniqueIdentifier = 0x42_006F,
  PutFunction = 0x42_0070,
  Q = 0x42_0071,
  QString = 0x42_0072,
  Qlength = 0x42_0073,
  QueryFunction = 0x42_0074,
  RecommendedCurve = 0x42_0075,
  ReplacedUniqueIdentifier = 0x42_0076,
  RequestHeader = 0x42_0077,
  RequestMessage = 0x42_0078,
  RequestPayload = 0x42_0079,
  ResponseHeader = 0x42_007A,
  ResponseMessage = 0x42_007B,
  ResponsePayload = 0x42_007C,
  ResultMessage = 0x42_007D,
  ResultReason = 0x42_007E,
  ResultStatus = 0x42_007F,
  RevocationMessage = 0x42_0080,
  RevocationReason = 0x42_0081,
  RevocationReasonCode = 0x42_0082,
  KeyRoleType = 0x42_0083,
  Salt = 0x42_0084,
  SecretData = 0x42_0085,
  SecretDataType = 0x42_0086,
  SerialNumber = 0x42_0087,
  ServerInformation = 0x42_0088,
  SplitKey = 0x42_0089,
  SplitKeyMethod = 0x42_008A,
  SplitKeyParts = 0x42_008B,
  SplitKeyThreshold = 0x42_008C,
  State = 0x42_008D,
  StorageStatusMask = 0x42_008E,
  SymmetricKey = 0x42_008F,
  Template = 0x42_0090,
  TemplateAttribute = 0x42_0091,
  TimeStamp = 0x42_0092,
  UniqueBatchItemID = 0x42_0093,
  UniqueIdentifier = 0x42_0094,
  UsageLimits = 0x42_0095,
  UsageLimitsCount = 0x42_0096,
  UsageLimitsTotal = 0x42_0097,
  UsageLimitsUnit = 0x42_0098,
  Username = 0x42_0099,
  ValidityDate = 0x42_009A,
  ValidityIndicator = 0x42_009B,
  VendorExtension = 0x42_009C,
  VendorIdentification = 0x42_009D,
  WrappingMethod = 0x42_009E,
  X = 0x42_009F,
  Y = 0x42_00A0,
  Password = 0x42_00A1,
  DeviceIdentifier = 0x42_00A2,
  EncodingOption = 0x42_00A3,
  ExtensionInformation = 0x42_00A4,
  ExtensionName = 0x42_00A5,
  ExtensionTag = 0x42_00A6,
  ExtensionType = 0x42_00A7,
  Fresh = 0x42_00A8,
  MachineIdentifier = 0x42_00A9,
  MediaIdentifier = 0x42_00AA,
  NetworkIdentifier = 0x42_00AB,
  ObjectGroupMember = 0x42_00AC,
  CertificateLength = 0x42_00AD,
  DigitalSignatureAlgorithm = 0x42_00AE,
  CertificateSerialNumber = 0x42_00AF,
  DeviceSerialNumber = 0x42_00B0,
  IssuerAlternativeName = 0x42_00B1,
  IssuerDistinguishedName = 0x42_00B2,
  SubjectAlternativeName = 0x42_00B3,
  SubjectDistinguishedName = 0x42_00B4,
  X509CertificateIdentifier = 0x42_00B5,
  X509CertificateIssuer = 0x42_00B6,
  X509CertificateSubject = 0x42_00B7,
  KeyValueLocation = 0x42_00B8,
  KeyValueLocationValue = 0x42_00B9,
  KeyValueLocationType = 0x42_00BA,
  KeyValuePresent = 0x42_00BB,
  OriginalCreationDate = 0x42_00BC,
  PGPKey = 0x42_00BD,
  PGPKeyVersion = 0x42_00BE,
  AlternativeName = 0x42_00BF,
  AlternativeNameValue = 0x42_00C0,
  AlternativeNameType = 0x42_00C1,
  Data = 0x42_00C2,
  SignatureData = 0x42_00C3,
  DataLength = 0x42_00C4,
  RandomIV = 0x42_00C5,
  MACData = 0x42_00C6,
  AttestationType = 0x42_00C7,
  Nonce = 0x42_00C8,
  NonceID = 0x42_00C9,
  NonceValue = 0x42_00CA,
  AttestationMeasurement = 0x42_00CB,
  AttestationAssertion = 0x42_00CC,
  IVLength = 0x42_00CD,
  TagLength = 0x42_00CE,
  FixedFieldLength = 0x42_00CF,
  CounterLength = 0x42_00D0,
  InitialCounterValue = 0x42_00D1,
  InvocationFieldLength = 0x42_00D2,
  AttestationCapableIndicator = 0x42_00D3,
  OffsetItems = 0x42_00D4,
  LocatedItems = 0x42_00D5,
  CorrelationValue = 0x42_00D6,
  InitIndicator = 0x42_00D7,
  FinalIndicator = 0x42_00D8,
  AuthenticatedEncryptionAdditionalData = 0x42_00FE,
  AuthenticatedEncryptionTag = 0x42_00FF,
  SaltLength = 0x42_0100,
  MaskGenerator = 0x42_0101,
  MaskGeneratorHashingAlgorithm = 0x42_0102,
  PSource = 0x42_0103,
  TrailerField = 0x42_0104,
  ClientCorrelationValue = 0x42_0105,
  ServerCorrelationValue = 0x42_0106,
  DigestedData = 0x42_0107,
}
impl FromU32 for Tag {}

impl From<Tag> for u32 {
  fn from(tag: Tag) -> Self {
    tag as u32
  }
}

impl Tag {
  /// Name of a known tag, `None` for tags outside the registry.
  pub fn name(raw: u32) -> Option<&'static str> {
    Tag::fromu32(raw).map(Into::into)
  }

  /// Resolves a tag from its registry name or from a `0x42xxxx` literal.
  pub fn parse(name: &str) -> Option<u32> {
    if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
      return u32::from_str_radix(hex, 16)
        .ok()
        .filter(|raw| *raw <= 0xFF_FFFF);
    }
    Tag::from_str(name).ok().map(u32::from)
  }
}

/// Human readable form of a raw tag, used in error messages and XML output.
pub fn tag_display(raw: u32) -> String {
  match Tag::name(raw) {
    Some(name) => name.to_string(),
    None => format!("0x{:06X}", raw),
  }
}

macro_rules! kmip_enumeration {
  ($nm:ident { $($variant:ident = $val:expr),* $(,)? }) => {
    #[derive(Copy, Clone, Eq, PartialEq, Debug, FromPrimitive, ToPrimitive, IntoStaticStr, EnumString)]
    #[repr(u32)]
    pub enum $nm {
      $($variant = $val),*
    }
    impl FromU32 for $nm {}
  };
}

pub mod enumerations {
  use super::FromU32;
  use num_derive::{FromPrimitive, ToPrimitive};
  use strum_macros::{EnumString, IntoStaticStr};

  kmip_enumeration!(Operation {
    Create = 0x0000_0001,
    CreateKeyPair = 0x0000_0002,
    Register = 0x0000_0003,
    ReKey = 0x0000_0004,
    DeriveKey = 0x0000_0005,
    Certify = 0x0000_0006,
    ReCertify = 0x0000_0007,
    Locate = 0x0000_0008,
    Check = 0x0000_0009,
    Get = 0x0000_000A,
    GetAttributes = 0x0000_000B,
    GetAttributeList = 0x0000_000C,
    AddAttribute = 0x0000_000D,
    ModifyAttribute = 0x0000_000E,
    DeleteAttribute = 0x0000_000F,
    ObtainLease = 0x0000_0010,
    GetUsageAllocation = 0x0000_0011,
    Activate = 0x0000_0012,
    Revoke = 0x0000_0013,
    Destroy = 0x0000_0014,
    Archive = 0x0000_0015,
    Recover = 0x0000_0016,
    Validate = 0x0000_0017,
    Query = 0x0000_0018,
    Cancel = 0x0000_0019,
    Poll = 0x0000_001A,
    Notify = 0x0000_001B,
    Put = 0x0000_001C,
    ReKeyKeyPair = 0x0000_001D,
    DiscoverVersions = 0x0000_001E,
    Encrypt = 0x0000_001F,
    Decrypt = 0x0000_0020,
    Sign = 0x0000_0021,
    SignatureVerify = 0x0000_0022,
    MAC = 0x0000_0023,
    MACVerify = 0x0000_0024,
    RNGRetrieve = 0x0000_0025,
    RNGSeed = 0x0000_0026,
    Hash = 0x0000_0027,
    CreateSplitKey = 0x0000_0028,
    JoinSplitKey = 0x0000_0029,
    Import = 0x0000_002A,
    Export = 0x0000_002B,
  });

  kmip_enumeration!(ResultStatus {
    Success = 0x0000_0000,
    OperationFailed = 0x0000_0001,
    OperationPending = 0x0000_0002,
    OperationUndone = 0x0000_0003,
  });

  kmip_enumeration!(ResultReason {
    ItemNotFound = 0x0000_0001,
    ResponseTooLarge = 0x0000_0002,
    AuthenticationNotSuccessful = 0x0000_0003,
    InvalidMessage = 0x0000_0004,
    OperationNotSupported = 0x0000_0005,
    MissingData = 0x0000_0006,
    InvalidField = 0x0000_0007,
    FeatureNotSupported = 0x0000_0008,
    OperationCanceledByRequester = 0x0000_0009,
    CryptographicFailure = 0x0000_000A,
    IllegalOperation = 0x0000_000B,
    PermissionDenied = 0x0000_000C,
    ObjectArchived = 0x0000_000D,
    IndexOutOfBounds = 0x0000_000E,
    ApplicationNamespaceNotSupported = 0x0000_000F,
    KeyFormatTypeNotSupported = 0x0000_0010,
    KeyCompressionTypeNotSupported = 0x0000_0011,
    EncodingOptionError = 0x0000_0012,
    KeyValueNotPresent = 0x0000_0013,
    AttestationRequired = 0x0000_0014,
    AttestationFailed = 0x0000_0015,
    Sensitive = 0x0000_0016,
    NotExtractable = 0x0000_0017,
    ObjectAlreadyExists = 0x0000_0018,
    GeneralFailure = 0x0000_0100,
  });

  kmip_enumeration!(ObjectType {
    Certificate = 0x0000_0001,
    SymmetricKey = 0x0000_0002,
    PublicKey = 0x0000_0003,
    PrivateKey = 0x0000_0004,
    SplitKey = 0x0000_0005,
    Template = 0x0000_0006,
    SecretData = 0x0000_0007,
    OpaqueObject = 0x0000_0008,
    PGPKey = 0x0000_0009,
  });

  kmip_enumeration!(CryptographicAlgorithm {
    DES = 0x0000_0001,
    AES = 0x0000_0003,
    RSA = 0x0000_0004,
    DSA = 0x0000_0005,
    ECDSA = 0x0000_0006,
  });

  kmip_enumeration!(NameType {
    UninterpretedTextString = 0x0000_0001,
    URI = 0x0000_0002,
  });

  kmip_enumeration!(CredentialType {
    UsernameAndPassword = 0x0000_0001,
    Device = 0x0000_0002,
    Attestation = 0x0000_0003,
  });

  kmip_enumeration!(KeyFormatType {
    Raw = 0x0000_0001,
    Opaque = 0x0000_0002,
    PKCS1 = 0x0000_0003,
    PKCS8 = 0x0000_0004,
    X509 = 0x0000_0005,
    ECPrivateKey = 0x0000_0006,
    TransparentSymmetricKey = 0x0000_0007,
  });

  kmip_enumeration!(BatchErrorContinuationOption {
    Continue = 0x0000_0001,
    Stop = 0x0000_0002,
    Undo = 0x0000_0003,
  });
}

use enumerations::*;

// Tags whose Enumeration values have names in the registry.
macro_rules! enumeration_tags {
  ($($tag:ident => $ty:ident),* $(,)?) => {
    /// Name of an enumeration value carried under `tag`, if both are known.
    pub fn enumeration_name(tag: u32, value: u32) -> Option<&'static str> {
      match Tag::fromu32(tag)? {
        $(Tag::$tag => $ty::fromu32(value).map(Into::into),)*
        _ => None,
      }
    }

    /// Value of the enumeration variant `name` carried under `tag`.
    pub fn enumeration_value(tag: u32, name: &str) -> Option<u32> {
      match Tag::fromu32(tag)? {
        $(Tag::$tag => $ty::from_str(name).ok().map(|v| v as u32),)*
        _ => None,
      }
    }
  };
}

enumeration_tags!(
  Operation => Operation,
  ResultStatus => ResultStatus,
  ResultReason => ResultReason,
  ObjectType => ObjectType,
  CryptographicAlgorithm => CryptographicAlgorithm,
  NameType => NameType,
  CredentialType => CredentialType,
  KeyFormatType => KeyFormatType,
  BatchErrorContinuationOption => BatchErrorContinuationOption,
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tag_names_resolve_both_ways() {
    assert_eq!(Tag::name(0x42_0078), Some("RequestMessage"));
    assert_eq!(Tag::parse("ResponseMessage"), Some(0x42_007B));
    assert_eq!(Tag::parse("0x540001"), Some(0x54_0001));
    assert_eq!(Tag::parse("0x1000000"), None);
    assert_eq!(Tag::parse("NotATag"), None);
    assert_eq!(tag_display(0x54_0001), "0x540001");
  }

  #[test]
  fn enumerations_are_scoped_by_tag() {
    let op = u32::from(Tag::Operation);
    assert_eq!(enumeration_name(op, 0x0A), Some("Get"));
    assert_eq!(enumeration_value(op, "Get"), Some(0x0A));
    // same value, different tag
    assert_eq!(
      enumeration_name(u32::from(Tag::ResultStatus), 0x01),
      Some("OperationFailed")
    );
    assert_eq!(enumeration_name(u32::from(Tag::UniqueIdentifier), 0x01), None);
    assert_eq!(enumeration_value(op, "Bogus"), None);
  }
}
